//! Prompt construction for catalog photo enhancement.

use crate::modules::imaging::domain::enhancer::EnhanceMetadata;
use regex::Regex;
use std::sync::OnceLock;

fn dimension_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"\d+/\d+",                    // fractions: 1/4, 3/8
            r#"(?i)\d+\s*(mm|cm|m|pulg|in|"|')"#, // lengths: 20mm, 5cm, 3"
            r"(?i)\bm\d+",                 // metric threads: M10, M8
            r"\d+x\d+",                    // 10x20
            r"#\d+",                       // gauges: #8
            r"(?i)\d+\s*(kg|g|lb)\b",      // weights
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

/// True when the name or description mentions a size, gauge, thread or weight
pub fn has_dimensions(name: &str, description: &str) -> bool {
    let text = format!("{} {}", name, description).to_lowercase();
    dimension_patterns().iter().any(|re| re.is_match(&text))
}

pub fn build_prompt(metadata: &EnhanceMetadata) -> String {
    let name = metadata.name.as_deref().unwrap_or_default();
    let description = metadata.description.as_deref().unwrap_or_default();

    let mut prompt = String::from(
        "Generate a high quality professional catalog image based on this product photo.",
    );

    if !name.is_empty() {
        prompt.push_str(&format!(" The product is: \"{}\".", name));
    }
    if !description.is_empty() {
        prompt.push_str(&format!(" Description: \"{}\".", description));
    }

    if has_dimensions(name, description) {
        prompt.push_str(
            "\n\nThis item has size specifications. IMPORTANT: add professional dimension \
             lines marking the main measurements of the product, medium-thick, vivid red \
             (#E30613), with small arrowheads, placed so they never cover the product. \
             Minimal technical-drawing style.",
        );
    }

    prompt.push_str(
        "\n\nGeneral instructions:\
         \n- If the photo shows several identical pieces, show ONLY ONE representative unit, centered\
         \n- Keep the object EXACTLY the same: shape, color, texture and proportions\
         \n- Improve lighting so it looks like a professional e-commerce studio photo\
         \n- Pure white background (#FFFFFF), clean and even, no hard shadows or noise\
         \n- Photorealistic, sharp focus, professional photographic quality\
         \n- Do NOT alter the design of the item or add decorative elements\
         \n- Only improve the photographic presentation for the inventory catalog",
    );

    if let Some(unit) = metadata.unit.as_deref().filter(|u| !u.is_empty()) {
        prompt.push_str(&format!("\n- Unit of measure: {}", unit));
    }

    prompt.push_str("\n\nGenerate the image in high resolution with professional catalog quality.");
    prompt
}

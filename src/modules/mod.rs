// Bounded contexts
pub mod catalog; // Article lookup and image write-back
pub mod image_queue; // Durable queue, admin API and worker
pub mod imaging; // Enhancer and object store clients

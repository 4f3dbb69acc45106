pub mod prompt;
pub mod server;
pub mod utils;

pub use server::extract_content_json;
pub use utils::MediaMonkeyWrapper;

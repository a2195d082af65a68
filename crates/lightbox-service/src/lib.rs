mod http;
mod local;
mod record;
mod traits;

pub use http::HttpService;
pub use local::LocalService;
pub use record::AssetRecord;
pub use traits::{MediaService, ServiceError};

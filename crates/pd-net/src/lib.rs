//! Networking contracts: URLs, HTTP messages, requests, responses, and form bodies.

pub mod form_data;
pub mod http;
pub mod request;
pub mod response;
pub mod url;

pub use form_data::FormData;
pub use form_data::FormDataList;
pub use form_data::FormEncodingType;
pub use http::Header;
pub use http::HeaderList;
pub use http::HttpMethod;
pub use http::HttpStatusCode;
pub use request::CachePolicy;
pub use request::ResourceRequest;
pub use response::ResourceError;
pub use response::ResourceResponse;

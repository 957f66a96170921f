pub mod cache;
pub mod dispatch;
pub mod errors;
pub mod filtering;
pub mod http;
pub mod manager;
pub mod metadata;
pub mod params;
pub mod relational;
pub mod sequential;
pub mod value;

pub use dispatch::{DispatchOptions, Dispatcher, RestRequest, RestResponse};
pub use errors::RestError;
pub use manager::{DataSource, EntityManager, EntityWriter, FetchEntitiesResponse, StoreError};
pub use metadata::{EntityMetadata, EntitySummary, FieldDataType, FieldMetadata};
pub use params::{RestFilter, RestParameters};
pub use value::{FieldValue, Record};

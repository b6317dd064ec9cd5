pub mod credentials;
pub mod etherscan;
pub mod eventbridge;
pub mod notification;
pub mod rpc;

pub use credentials::{CredentialsDocument, IMDS_SUCCESS};
pub use etherscan::EtherscanResponse;
pub use eventbridge::{
    AwsErrorBody, CreateEventBusRequest, CreateEventBusResponse, PutEventsRequest,
    PutEventsResponse, PutEventsResultEntry, RESOURCE_ALREADY_EXISTS,
};
pub use notification::{
    DEFAULT_EVENT_BUS_NAME, DETAIL_TYPE, NotificationMessage, SOURCE, to_python_json,
};
pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, LogQuery, RpcLog, format_quantity, parse_quantity};

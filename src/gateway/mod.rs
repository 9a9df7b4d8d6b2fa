//! 브로커 게이트웨이 연동
//!
//! 요청 트레이트, 콜백 큐, 요청-응답 세션, 모의 게이트웨이

pub mod events;
pub mod session;
pub mod simulated;
pub mod traits;

pub use events::{ChannelEventSink, EventDispatcher, GatewayEvent};
pub use session::{GatewaySession, PendingRequests};
pub use simulated::SimulatedGateway;
pub use traits::{ContractResolver, EventSink, Gateway, QuoteSource, ReqId};

//! Queue transport: trigger event unwrapping, reply delivery, and the handler
//! that ties them to the batch engine.

pub mod event;
pub mod handler;
pub mod memory;
pub mod reply;

pub use aws_lambda_events::event::sqs::{BatchItemFailure, SqsBatchResponse, SqsEvent, SqsMessage};
pub use event::{batch_response, into_records, BodyEncoding};
pub use handler::{QueueHandler, QueueHandlerError};
pub use memory::MemoryQueueClient;
pub use reply::{send_replies, ReplySendError};

//! Queue ingress for deployment requests.
//!
//! - **Listener** (`listener`) - consume loop with bounded concurrency, settlement and reconnect
//! - **AMQP** (`amqp`) - RabbitMQ transport over `lapin`
//!
//! ```text
//! broker → QueueTransport → QueueListener → DeliveryHandler (DeploymentPipeline)
//!                 ↑                              │
//!                 └──── ack / reject ◄───────────┘
//! ```

pub mod amqp;
pub mod listener;

pub use amqp::{AmqpSettings, AmqpTransport};
pub use listener::{
    Delivery, DeliveryHandler, ListenerSnapshot, ListenerStatus, QueueListener, QueueTransport,
    ReconnectPolicy, TransportError,
};

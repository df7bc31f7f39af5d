use async_trait::async_trait;
use deplo_core::Disposition;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicQosOptions, BasicRejectOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::debug;

use crate::listener::{Delivery, QueueTransport, TransportError};

#[derive(Clone, Debug)]
pub struct AmqpSettings {
    pub url: SecretString,
    pub queue: String,
    pub consumer_tag: String,
    pub prefetch: u16,
}

/// RabbitMQ transport: one connection, one channel, one manual-ack consumer on a durable
/// queue. `connect` replaces whatever session existed before.
pub struct AmqpTransport {
    settings: AmqpSettings,
    connection: Mutex<Option<Connection>>,
    channel: Mutex<Option<Channel>>,
    consumer: Mutex<Option<Consumer>>,
}

impl AmqpTransport {
    pub fn new(settings: AmqpSettings) -> Self {
        Self {
            settings,
            connection: Mutex::new(None),
            channel: Mutex::new(None),
            consumer: Mutex::new(None),
        }
    }

    async fn open(&self) -> Result<(Connection, Channel, Consumer), lapin::Error> {
        let connection =
            Connection::connect(self.settings.url.expose_secret(), ConnectionProperties::default())
                .await?;
        let channel = connection.create_channel().await?;
        channel.basic_qos(self.settings.prefetch, BasicQosOptions::default()).await?;
        channel
            .queue_declare(
                &self.settings.queue,
                QueueDeclareOptions { durable: true, ..QueueDeclareOptions::default() },
                FieldTable::default(),
            )
            .await?;
        let consumer = channel
            .basic_consume(
                &self.settings.queue,
                &self.settings.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok((connection, channel, consumer))
    }

    async fn channel(&self) -> Result<Channel, TransportError> {
        self.channel
            .lock()
            .await
            .clone()
            .ok_or_else(|| TransportError::Settle("no open channel".to_owned()))
    }
}

#[async_trait]
impl QueueTransport for AmqpTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let (connection, channel, consumer) =
            self.open().await.map_err(|error| TransportError::Connect(error.to_string()))?;
        debug!(
            queue = %self.settings.queue,
            prefetch = self.settings.prefetch,
            "consumer registered"
        );

        *self.consumer.lock().await = Some(consumer);
        *self.channel.lock().await = Some(channel);
        *self.connection.lock().await = Some(connection);
        Ok(())
    }

    async fn next_delivery(&self) -> Result<Option<Delivery>, TransportError> {
        let mut consumer = self.consumer.lock().await;
        let Some(stream) = consumer.as_mut() else {
            return Err(TransportError::Receive("consumer is not registered".to_owned()));
        };

        // A live consumer only ends when the broker cancels it or the channel dies.
        match stream.next().await {
            Some(Ok(delivery)) => {
                Ok(Some(Delivery { tag: delivery.delivery_tag, body: delivery.data }))
            }
            Some(Err(error)) => Err(TransportError::Receive(error.to_string())),
            None => Err(TransportError::Receive("consumer stream ended".to_owned())),
        }
    }

    async fn settle(&self, tag: u64, disposition: Disposition) -> Result<(), TransportError> {
        let channel = self.channel().await?;
        let result = match disposition {
            Disposition::Acknowledge => channel.basic_ack(tag, BasicAckOptions::default()).await,
            Disposition::Reject => {
                channel.basic_reject(tag, BasicRejectOptions { requeue: false }).await
            }
        };
        result.map_err(|error| TransportError::Settle(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.consumer.lock().await.take();
        self.channel.lock().await.take();
        let Some(connection) = self.connection.lock().await.take() else {
            return Ok(());
        };
        connection
            .close(200, "shutdown")
            .await
            .map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}

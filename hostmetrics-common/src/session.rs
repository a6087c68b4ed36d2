use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, LastWill, MqttOptions, Packet};

use crate::config::MqttConfig;
use crate::error::{Error, Result};

/// Capacity of the client's outbound request channel.
pub const REQUEST_CAPACITY: usize = 64;

/// Minimum keep-alive accepted by the client.
const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// An established MQTT session.
///
/// `client` is the cheap, cloneable submit handle; `eventloop` must be
/// polled continuously (usually from a dedicated task) to move traffic.
pub struct MqttSession {
    pub client: AsyncClient,
    pub eventloop: EventLoop,
}

/// Build client options from the connection configuration.
pub fn mqtt_options(
    config: &MqttConfig,
    client_id: &str,
    last_will: Option<LastWill>,
) -> MqttOptions {
    let mut options = MqttOptions::new(client_id, config.host.as_str(), config.port);
    options.set_keep_alive(Duration::from_secs(
        config.keep_alive_secs.max(MIN_KEEP_ALIVE_SECS),
    ));

    if config.has_credentials() {
        options.set_credentials(config.username.as_str(), config.password.as_str());
    }

    if let Some(will) = last_will {
        options.set_last_will(will);
    }

    options
}

/// Connect to the MQTT broker and wait for the CONNACK.
///
/// Fails if the broker cannot be reached, refuses the connection, or does
/// not answer within `connect_timeout_secs`.
pub async fn connect(
    config: &MqttConfig,
    client_id: &str,
    last_will: Option<LastWill>,
) -> Result<MqttSession> {
    tracing::info!(
        broker = %config.address(),
        client_id = %client_id,
        authenticated = config.has_credentials(),
        "Connecting to MQTT broker"
    );

    let options = mqtt_options(config, client_id, last_will);
    let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

    let timeout = Duration::from_secs(config.connect_timeout_secs);
    tokio::time::timeout(timeout, wait_for_connack(&mut eventloop))
        .await
        .map_err(|_| {
            Error::Mqtt(format!(
                "no CONNACK from {} within {}s",
                config.address(),
                config.connect_timeout_secs
            ))
        })??;

    tracing::info!(broker = %config.address(), "Connected to MQTT broker");

    Ok(MqttSession { client, eventloop })
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<()> {
    loop {
        if let Event::Incoming(Packet::ConnAck(ack)) = eventloop.poll().await? {
            return match ack.code {
                ConnectReturnCode::Success => Ok(()),
                code => Err(Error::Mqtt(format!("connection refused: {:?}", code))),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_use_identity_as_client_id() {
        let config = MqttConfig::default();
        let options = mqtt_options(&config, "desktop01", None);

        assert_eq!(options.client_id(), "desktop01");
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
        assert_eq!(
            options.broker_address(),
            ("192.168.1.10".to_string(), 1883)
        );
    }

    #[test]
    fn test_keep_alive_is_clamped() {
        let config = MqttConfig {
            keep_alive_secs: 1,
            ..Default::default()
        };
        let options = mqtt_options(&config, "desktop01", None);
        assert_eq!(options.keep_alive(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_connect_refused_is_an_error() {
        // Port 1 on loopback is not expected to run an MQTT broker.
        let config = MqttConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            connect_timeout_secs: 5,
            ..Default::default()
        };

        let result = connect(&config, "test-client", None).await;
        assert!(matches!(result, Err(Error::Mqtt(_))));
    }
}

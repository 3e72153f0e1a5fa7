use serde_json::Value;
use tokio::sync::mpsc;

use super::{Transport, TransportError};

/// In-memory transport; the other end is held by a [`VenueEndpoint`]
///
/// Used by the integration tests and for dry runs against a scripted venue.
pub struct ChannelTransport {
    to_venue: mpsc::UnboundedSender<String>,
    from_venue: mpsc::UnboundedReceiver<String>,
    open: bool,
}

/// Venue side of a [`ChannelTransport`]
pub struct VenueEndpoint {
    requests: mpsc::UnboundedReceiver<String>,
    replies: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
    pub fn pair() -> (ChannelTransport, VenueEndpoint) {
        let (to_venue, requests) = mpsc::unbounded_channel();
        let (replies, from_venue) = mpsc::unbounded_channel();
        (
            ChannelTransport {
                to_venue,
                from_venue,
                open: false,
            },
            VenueEndpoint { requests, replies },
        )
    }
}

impl Transport for ChannelTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.to_venue.is_closed() {
            return Err(TransportError::Connect("venue endpoint dropped".to_string()));
        }
        self.open = true;
        Ok(())
    }

    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        self.to_venue.send(frame).map_err(|_| {
            self.open = false;
            TransportError::Closed
        })
    }

    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        match self.from_venue.recv().await {
            Some(frame) => Ok(Some(frame)),
            None => {
                self.open = false;
                Ok(None)
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl VenueEndpoint {
    /// Next request sent by the bot, parsed as JSON
    pub async fn next_request(&mut self) -> Option<Value> {
        let frame = self.requests.recv().await?;
        serde_json::from_str(&frame).ok()
    }

    /// Push a reply or stream message to the bot
    pub fn reply(&self, message: Value) -> bool {
        self.replies.send(message.to_string()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_round_trip_through_endpoint() {
        let (mut transport, mut venue) = ChannelTransport::pair();
        assert!(transport.send("{}".to_string()).await.is_err());

        transport.connect().await.unwrap();
        assert!(transport.is_open());
        transport
            .send(json!({"ticks": "R_100", "req_id": 1}).to_string())
            .await
            .unwrap();

        let request = venue.next_request().await.unwrap();
        assert_eq!(request["ticks"], "R_100");

        assert!(venue.reply(json!({"msg_type": "ticks"})));
        let frame = transport.recv().await.unwrap().unwrap();
        assert!(frame.contains("ticks"));
    }

    #[tokio::test]
    async fn test_dropped_venue_closes_transport() {
        let (mut transport, venue) = ChannelTransport::pair();
        transport.connect().await.unwrap();
        drop(venue);

        assert_eq!(transport.recv().await.unwrap(), None);
        assert!(!transport.is_open());
        assert!(transport.connect().await.is_err());
    }
}

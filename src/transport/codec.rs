use chrono::{TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::TransportError;
use crate::models::{Direction, Tick};

/// Request kinds this bot sends to the venue
#[derive(Debug, Clone, PartialEq)]
pub enum VenueRequest {
    Authorize {
        token: String,
    },
    BalanceSubscribe,
    TicksSubscribe {
        symbol: String,
    },
    Proposal {
        symbol: String,
        direction: Direction,
        stake: f64,
        duration_secs: u64,
        currency: String,
    },
    Buy {
        proposal_id: String,
        price: f64,
    },
    ContractSubscribe {
        contract_id: String,
    },
    Sell {
        contract_id: String,
    },
}

impl VenueRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            VenueRequest::Authorize { .. } => "authorize",
            VenueRequest::BalanceSubscribe => "balance",
            VenueRequest::TicksSubscribe { .. } => "ticks",
            VenueRequest::Proposal { .. } => "proposal",
            VenueRequest::Buy { .. } => "buy",
            VenueRequest::ContractSubscribe { .. } => "proposal_open_contract",
            VenueRequest::Sell { .. } => "sell",
        }
    }

    /// Whether the request is still meaningful after a reconnect
    ///
    /// Session setup is re-issued on every connect and an unconfirmed
    /// proposal/buy is abandoned, so only sells of open contracts survive.
    pub fn survives_reconnect(&self) -> bool {
        matches!(self, VenueRequest::Sell { .. })
    }
}

/// A request tagged with its correlation id
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub req_id: u64,
    pub request: VenueRequest,
}

/// Contract ids are numeric on the wire
fn contract_id_value(id: &str) -> Value {
    match id.parse::<u64>() {
        Ok(n) => json!(n),
        Err(_) => json!(id),
    }
}

pub fn encode(message: &OutboundMessage) -> Result<String, TransportError> {
    let mut body = match &message.request {
        VenueRequest::Authorize { token } => json!({ "authorize": token }),
        VenueRequest::BalanceSubscribe => json!({ "balance": 1, "subscribe": 1 }),
        VenueRequest::TicksSubscribe { symbol } => json!({ "ticks": symbol, "subscribe": 1 }),
        VenueRequest::Proposal {
            symbol,
            direction,
            stake,
            duration_secs,
            currency,
        } => json!({
            "proposal": 1,
            "amount": stake,
            "basis": "stake",
            "contract_type": direction.as_str(),
            "currency": currency,
            "duration": duration_secs,
            "duration_unit": "s",
            "symbol": symbol,
        }),
        VenueRequest::Buy { proposal_id, price } => json!({ "buy": proposal_id, "price": price }),
        VenueRequest::ContractSubscribe { contract_id } => json!({
            "proposal_open_contract": 1,
            "contract_id": contract_id_value(contract_id),
            "subscribe": 1,
        }),
        // Price 0 sells at market
        VenueRequest::Sell { contract_id } => json!({
            "sell": contract_id_value(contract_id),
            "price": 0,
        }),
    };
    body["req_id"] = json!(message.req_id);
    Ok(serde_json::to_string(&body)?)
}

/// Rejection categories the controller reacts to differently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    RateLimit,
    InvalidStake,
    Auth,
    Other,
}

impl ErrorClass {
    pub fn from_code(code: &str) -> Self {
        match code {
            "RateLimit" | "TooManyRequests" => ErrorClass::RateLimit,
            "ContractBuyValidationError" | "InvalidStake" | "InvalidAmount" | "StakeTooLow" => {
                ErrorClass::InvalidStake
            }
            "InvalidToken" | "AuthorizationRequired" | "InvalidAppID" => ErrorClass::Auth,
            _ => ErrorClass::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractUpdate {
    pub contract_id: String,
    pub is_sold: bool,
    pub sell_price: Option<f64>,
    pub buy_price: f64,
    pub current_spot: Option<f64>,
    pub profit: f64,
}

/// Venue messages this bot understands
#[derive(Debug, Clone, PartialEq)]
pub enum VenueMessage {
    Authorized {
        login_id: String,
        balance: f64,
        currency: String,
    },
    Balance {
        balance: f64,
        currency: String,
    },
    Tick(Tick),
    Proposal {
        proposal_id: String,
        ask_price: f64,
        payout: f64,
    },
    Bought {
        contract_id: String,
        buy_price: f64,
        shortcode: String,
    },
    Contract(ContractUpdate),
    Sold {
        sold_for: f64,
    },
    Error {
        code: String,
        message: String,
    },
    /// Recognised envelope without a payload this bot acts on
    Ack {
        msg_type: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub req_id: Option<u64>,
    pub message: VenueMessage,
}

// Wire shapes. The venue mixes numbers and strings for ids and prices.

#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Float(f64),
    Text(String),
}

impl Number {
    fn value(&self) -> Option<f64> {
        match self {
            Number::Float(v) => Some(*v),
            Number::Text(s) => s.parse().ok(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Id {
    Int(u64),
    Text(String),
}

impl Id {
    fn into_string(self) -> String {
        match self {
            Id::Int(n) => n.to_string(),
            Id::Text(s) => s,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(u8),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Int(n) => *n != 0,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    msg_type: Option<String>,
    req_id: Option<u64>,
    error: Option<WireError>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Deserialize)]
struct WireError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct WireAuthorize {
    #[serde(default)]
    loginid: String,
    balance: Number,
    #[serde(default)]
    currency: String,
}

#[derive(Deserialize)]
struct WireBalance {
    balance: Number,
    #[serde(default)]
    currency: String,
}

#[derive(Deserialize)]
struct WireTick {
    symbol: String,
    quote: Number,
    epoch: i64,
    volume: Option<Number>,
}

#[derive(Deserialize)]
struct WireProposal {
    id: Id,
    ask_price: Number,
    payout: Option<Number>,
}

#[derive(Deserialize)]
struct WireBuy {
    contract_id: Id,
    buy_price: Number,
    #[serde(default)]
    shortcode: String,
}

#[derive(Deserialize)]
struct WireContract {
    contract_id: Id,
    is_sold: Option<Flag>,
    sell_price: Option<Number>,
    buy_price: Number,
    current_spot: Option<Number>,
    profit: Option<Number>,
}

#[derive(Deserialize)]
struct WireSell {
    sold_for: Number,
}

fn payload<T: DeserializeOwned>(rest: &mut Map<String, Value>, key: &str) -> Result<T, TransportError> {
    let value = rest
        .remove(key)
        .ok_or_else(|| TransportError::Decode(format!("missing '{}' payload", key)))?;
    serde_json::from_value(value).map_err(|e| TransportError::Decode(format!("{}: {}", key, e)))
}

fn number(n: &Number, field: &str) -> Result<f64, TransportError> {
    n.value()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TransportError::Decode(format!("'{}' is not a number", field)))
}

fn optional_number(n: Option<&Number>) -> Option<f64> {
    n.and_then(Number::value).filter(|v| v.is_finite())
}

/// Decode one text frame, dispatching on `msg_type`
pub fn decode(frame: &str) -> Result<Inbound, TransportError> {
    let mut envelope: Envelope =
        serde_json::from_str(frame).map_err(|e| TransportError::Decode(e.to_string()))?;
    let req_id = envelope.req_id;

    if let Some(error) = envelope.error {
        return Ok(Inbound {
            req_id,
            message: VenueMessage::Error {
                code: error.code,
                message: error.message,
            },
        });
    }

    let msg_type = envelope
        .msg_type
        .ok_or_else(|| TransportError::Decode("missing msg_type".to_string()))?;
    let rest = &mut envelope.rest;

    let message = match msg_type.as_str() {
        "authorize" => {
            let wire: WireAuthorize = payload(rest, "authorize")?;
            VenueMessage::Authorized {
                login_id: wire.loginid,
                balance: number(&wire.balance, "balance")?,
                currency: wire.currency,
            }
        }
        "balance" => {
            let wire: WireBalance = payload(rest, "balance")?;
            VenueMessage::Balance {
                balance: number(&wire.balance, "balance")?,
                currency: wire.currency,
            }
        }
        "tick" => {
            let wire: WireTick = payload(rest, "tick")?;
            let timestamp = Utc
                .timestamp_opt(wire.epoch, 0)
                .single()
                .ok_or_else(|| TransportError::Decode(format!("bad epoch {}", wire.epoch)))?;
            VenueMessage::Tick(Tick::new(
                wire.symbol,
                number(&wire.quote, "quote")?,
                optional_number(wire.volume.as_ref()).unwrap_or(0.0),
                timestamp,
            ))
        }
        "proposal" => {
            let wire: WireProposal = payload(rest, "proposal")?;
            VenueMessage::Proposal {
                proposal_id: wire.id.into_string(),
                ask_price: number(&wire.ask_price, "ask_price")?,
                payout: optional_number(wire.payout.as_ref()).unwrap_or(0.0),
            }
        }
        "buy" => {
            let wire: WireBuy = payload(rest, "buy")?;
            VenueMessage::Bought {
                contract_id: wire.contract_id.into_string(),
                buy_price: number(&wire.buy_price, "buy_price")?,
                shortcode: wire.shortcode,
            }
        }
        "proposal_open_contract" => {
            let wire: WireContract = payload(rest, "proposal_open_contract")?;
            VenueMessage::Contract(ContractUpdate {
                contract_id: wire.contract_id.into_string(),
                is_sold: wire.is_sold.as_ref().map(Flag::is_set).unwrap_or(false),
                sell_price: optional_number(wire.sell_price.as_ref()),
                buy_price: number(&wire.buy_price, "buy_price")?,
                current_spot: optional_number(wire.current_spot.as_ref()),
                profit: optional_number(wire.profit.as_ref()).unwrap_or(0.0),
            })
        }
        "sell" => {
            let wire: WireSell = payload(rest, "sell")?;
            VenueMessage::Sold {
                sold_for: number(&wire.sold_for, "sold_for")?,
            }
        }
        _ => VenueMessage::Ack { msg_type },
    };

    Ok(Inbound { req_id, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_proposal() {
        let frame = encode(&OutboundMessage {
            req_id: 7,
            request: VenueRequest::Proposal {
                symbol: "R_100".to_string(),
                direction: Direction::Put,
                stake: 1.5,
                duration_secs: 60,
                currency: "USD".to_string(),
            },
        })
        .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["proposal"], 1);
        assert_eq!(value["contract_type"], "PUT");
        assert_eq!(value["amount"], 1.5);
        assert_eq!(value["duration_unit"], "s");
        assert_eq!(value["symbol"], "R_100");
        assert_eq!(value["req_id"], 7);
    }

    #[test]
    fn test_encode_contract_id_as_number() {
        let frame = encode(&OutboundMessage {
            req_id: 1,
            request: VenueRequest::ContractSubscribe {
                contract_id: "123456".to_string(),
            },
        })
        .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["contract_id"], 123456);
        assert_eq!(value["subscribe"], 1);
    }

    #[test]
    fn test_decode_tick() {
        let inbound = decode(
            r#"{"msg_type":"tick","tick":{"symbol":"R_100","quote":1234.56,"epoch":1700000000}}"#,
        )
        .unwrap();
        match inbound.message {
            VenueMessage::Tick(tick) => {
                assert_eq!(tick.symbol, "R_100");
                assert_eq!(tick.price, 1234.56);
                assert_eq!(tick.volume, 0.0);
                assert_eq!(tick.timestamp.timestamp(), 1_700_000_000);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(inbound.req_id, None);
    }

    #[test]
    fn test_decode_buy_with_numeric_contract_id() {
        let inbound = decode(
            r#"{"msg_type":"buy","req_id":4,"buy":{"contract_id":98765,"buy_price":"1.00","shortcode":"CALL_R_100"}}"#,
        )
        .unwrap();
        assert_eq!(inbound.req_id, Some(4));
        assert_eq!(
            inbound.message,
            VenueMessage::Bought {
                contract_id: "98765".to_string(),
                buy_price: 1.0,
                shortcode: "CALL_R_100".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_settled_contract() {
        let inbound = decode(
            r#"{"msg_type":"proposal_open_contract","proposal_open_contract":{"contract_id":1,"is_sold":1,"sell_price":1.95,"buy_price":1.0,"profit":0.95}}"#,
        )
        .unwrap();
        match inbound.message {
            VenueMessage::Contract(update) => {
                assert!(update.is_sold);
                assert_eq!(update.sell_price, Some(1.95));
                assert_eq!(update.current_spot, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_class() {
        let inbound = decode(
            r#"{"msg_type":"proposal","req_id":3,"error":{"code":"RateLimit","message":"slow down"}}"#,
        )
        .unwrap();
        match inbound.message {
            VenueMessage::Error { code, .. } => {
                assert_eq!(ErrorClass::from_code(&code), ErrorClass::RateLimit)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ErrorClass::from_code("InvalidToken"), ErrorClass::Auth);
        assert_eq!(
            ErrorClass::from_code("ContractBuyValidationError"),
            ErrorClass::InvalidStake
        );
        assert_eq!(ErrorClass::from_code("MarketIsClosed"), ErrorClass::Other);
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        assert!(decode("not json").is_err());
        assert!(decode(r#"{"req_id":1}"#).is_err());
        assert!(decode(r#"{"msg_type":"tick","tick":{"symbol":"R_100","quote":"abc","epoch":1}}"#).is_err());
        assert!(matches!(
            decode(r#"{"msg_type":"ping","ping":"pong"}"#).unwrap().message,
            VenueMessage::Ack { .. }
        ));
    }
}

//! The Zipkin v2 JSON span model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The role of a span in an RPC or messaging exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Kind {
    /// The client side of an RPC.
    Client,
    /// The server side of an RPC.
    Server,
    /// The sender of a message.
    Producer,
    /// The receiver of a message.
    Consumer,
}

/// The network context of a node in the service graph.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Endpoint {
    /// Lowercase label of this node in the service graph.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    /// Text representation of the IPv4 address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,
    /// Text representation of the IPv6 address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
    /// Port of the endpoint, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
}

/// An event with an epoch microsecond timestamp.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Epoch microseconds of the event.
    pub timestamp: i64,
    /// Usually a short tag indicating the event.
    pub value: String,
}

/// A Zipkin v2 span.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Trace id as 16 or 32 lowercase hex characters.
    pub trace_id: String,
    /// Parent span id as 16 hex characters, absent on root spans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Span id as 16 hex characters.
    pub id: String,
    /// Role of the span, absent for local spans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Kind>,
    /// Logical operation name.
    #[serde(default)]
    pub name: String,
    /// Epoch microseconds of the span start.
    #[serde(default)]
    pub timestamp: i64,
    /// Duration in microseconds.
    #[serde(default)]
    pub duration: i64,
    /// Whether the span was force-sampled.
    #[serde(default)]
    pub debug: bool,
    /// The host that recorded this span.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_endpoint: Option<Endpoint>,
    /// The other side of the connection, for RPC and messaging spans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_endpoint: Option<Endpoint>,
    /// Timestamped events.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    /// String tags, kept sorted by key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

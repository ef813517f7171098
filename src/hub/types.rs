use std::collections::HashMap;

/// Topic = the URL of the resource whose changes subscribers want
/// notified about.
pub type Topic = String;

/// Mapping: topic → subscriber callback URL → absolute lease expiry in
/// unix seconds.
pub type SubscriptionMap = HashMap<Topic, HashMap<String, u64>>;

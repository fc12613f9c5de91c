//! Names shared by emitters and assertions on structured log events

/// Field keys every lifecycle event carries
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

/// Context keys attached by the provider and the store
pub const FIELD_DESCRIPTOR: &str = "descriptor";
pub const FIELD_REGISTRY_ID: &str = "registry_id";

/// Keys of `end_error` events
pub const FIELD_ERR_CODE: &str = "err_code";
pub const FIELD_CAUSE_CODE: &str = "cause_code";

pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

pub const OP_INITIALIZE: &str = "provider.initialize";
pub const OP_SHUTDOWN: &str = "provider.shutdown";
pub const OP_OPEN_SESSION: &str = "session_factory.open_session";
pub const OP_APPLY_MAPPINGS: &str = "store.apply_mappings";

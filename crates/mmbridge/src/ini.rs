//! Typed access to MediaMonkey's INI configuration store.
//!
//! The store is untyped at the boundary: whatever a `StringValue`,
//! `IntValue` or `BoolValue` read returns is coerced to the declared type
//! here, and caller input is coerced the other way before it is written.
//! The write call itself takes an optional trailing flags argument on some
//! builds and rejects it on others; [`write_ini_value`] papers over that.

use crate::host::{AutomationHost, IniAccessor, IniStore, PersistOp};
use crate::types::{parse_int, HostValue};
use crate::AutomationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, instrument};

/// Tokens read as `true` for boolean settings (compared case-insensitively).
pub const TRUTHY_TOKENS: [&str; 6] = ["1", "true", "yes", "on", "y", "t"];

/// Flags value passed to the four-argument form of the write accessors.
const DEFAULT_WRITE_FLAGS: i32 = 0;

/// Declared storage type of an INI entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IniValueType {
    #[default]
    String,
    Int,
    Bool,
}

impl IniValueType {
    pub fn accessor(self) -> IniAccessor {
        match self {
            IniValueType::String => IniAccessor::StringValue,
            IniValueType::Int => IniAccessor::IntValue,
            IniValueType::Bool => IniAccessor::BoolValue,
        }
    }
}

/// A typed INI value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IniValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl IniValue {
    pub fn to_host_value(&self) -> HostValue {
        match self {
            IniValue::Bool(b) => HostValue::Bool(*b),
            IniValue::Int(i) => HostValue::Int(*i),
            IniValue::Str(s) => HostValue::Str(s.clone()),
        }
    }
}

impl fmt::Display for IniValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IniValue::Bool(b) => write!(f, "{b}"),
            IniValue::Int(i) => write!(f, "{i}"),
            IniValue::Str(s) => f.write_str(s),
        }
    }
}

/// How hard a mutation is pushed towards durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistMode {
    #[default]
    None,
    Flush,
    Apply,
}

fn is_truthy_token(text: &str) -> bool {
    let text = text.trim();
    TRUTHY_TOKENS
        .iter()
        .any(|token| token.eq_ignore_ascii_case(text))
}

/// Coerce a raw store value to `value_type`.
///
/// Booleans never fail: unknown tokens and empty values read as `false`.
/// An integer that cannot be parsed yields `None` instead of an error, as
/// does an empty value read as a string.
pub fn coerce_ini_result(raw: &HostValue, value_type: IniValueType) -> Option<IniValue> {
    match value_type {
        IniValueType::Bool => Some(IniValue::Bool(match raw {
            HostValue::Str(s) => is_truthy_token(s),
            other => other.truthy(),
        })),
        IniValueType::Int => raw.to_i64().map(IniValue::Int),
        IniValueType::String => raw.to_text().map(IniValue::Str),
    }
}

/// Coerce caller input to the representation the store expects for
/// `value_type`. Only a non-numeric integer is rejected.
pub fn coerce_ini_input(
    value: &IniValue,
    value_type: IniValueType,
) -> Result<IniValue, AutomationError> {
    match value_type {
        IniValueType::String => Ok(IniValue::Str(value.to_string())),
        IniValueType::Int => match value {
            IniValue::Int(i) => Ok(IniValue::Int(*i)),
            IniValue::Bool(b) => Ok(IniValue::Int(i64::from(*b))),
            IniValue::Str(s) => parse_int(s).map(IniValue::Int).ok_or_else(|| {
                AutomationError::InvalidArgument(format!("'{s}' is not a valid integer"))
            }),
        },
        IniValueType::Bool => Ok(IniValue::Bool(match value {
            IniValue::Bool(b) => *b,
            IniValue::Int(i) => *i != 0,
            IniValue::Str(s) => is_truthy_token(s),
        })),
    }
}

/// Write through `accessor`, preferring the four-argument form.
///
/// The call is made with `flags = 0` first; only a signature mismatch
/// triggers the retry without it. Any other failure, and a failure of the
/// retry, is returned as is.
pub fn write_ini_value(
    store: &dyn IniStore,
    accessor: IniAccessor,
    section: &str,
    key: &str,
    value: &HostValue,
) -> Result<(), AutomationError> {
    match store.write(accessor, section, key, value, Some(DEFAULT_WRITE_FLAGS)) {
        Err(AutomationError::SignatureMismatch(reason)) => {
            debug!(
                "{} rejected the flags argument ({}); retrying without it",
                accessor.member_name(),
                reason
            );
            store.write(accessor, section, key, value, None)
        }
        other => other,
    }
}

/// Push pending INI changes according to `mode`.
///
/// Returns whether a persistence call was issued, which says nothing about
/// whether the store actually reached disk.
pub fn persist_ini_changes(
    store: &dyn IniStore,
    mode: PersistMode,
) -> Result<bool, AutomationError> {
    match mode {
        PersistMode::None => Ok(false),
        PersistMode::Flush => {
            if !store.supports(PersistOp::Flush) {
                debug!("INI store does not expose Flush");
                return Ok(false);
            }
            store.persist(PersistOp::Flush)?;
            Ok(true)
        }
        PersistMode::Apply => {
            let apply = store.supports(PersistOp::Apply);
            let flush = store.supports(PersistOp::Flush);
            if apply {
                store.persist(PersistOp::Apply)?;
            }
            if flush {
                store.persist(PersistOp::Flush)?;
            }
            if !apply && !flush {
                debug!("INI store exposes neither Apply nor Flush");
            }
            Ok(apply || flush)
        }
    }
}

/// A read, or a write followed by a read, of one INI entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRequest {
    pub section: String,
    pub key: String,
    /// `None` reads the entry without changing it.
    #[serde(default)]
    pub value: Option<IniValue>,
    #[serde(default)]
    pub value_type: IniValueType,
    #[serde(default)]
    pub persist: PersistMode,
}

impl ConfigRequest {
    pub fn read(section: impl Into<String>, key: impl Into<String>, value_type: IniValueType) -> Self {
        Self {
            section: section.into(),
            key: key.into(),
            value: None,
            value_type,
            persist: PersistMode::None,
        }
    }

    pub fn write(
        section: impl Into<String>,
        key: impl Into<String>,
        value: IniValue,
        value_type: IniValueType,
        persist: PersistMode,
    ) -> Self {
        Self {
            section: section.into(),
            key: key.into(),
            value: Some(value),
            value_type,
            persist,
        }
    }

    pub fn validate(&self) -> Result<(), AutomationError> {
        if self.section.trim().is_empty() {
            return Err(AutomationError::InvalidArgument(
                "INI section cannot be empty".to_string(),
            ));
        }
        if self.key.trim().is_empty() {
            return Err(AutomationError::InvalidArgument(
                "INI key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of reading or mutating an INI entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue {
    pub section: String,
    pub key: String,
    pub value_type: IniValueType,
    /// Value after the mutation in `value_type`'s representation, or `None`
    /// when the stored entry cannot be read as that type.
    pub value: Option<IniValue>,
    /// Value before the mutation, when it could be read.
    pub previous_value: Option<IniValue>,
    /// True when a persistence call (Apply and/or Flush) was issued.
    pub applied: bool,
}

fn read_coerced(
    store: &dyn IniStore,
    request: &ConfigRequest,
) -> Result<Option<IniValue>, AutomationError> {
    let accessor = request.value_type.accessor();
    match store.read(accessor, &request.section, &request.key) {
        Ok(raw) => Ok(coerce_ini_result(&raw, request.value_type)),
        Err(e) if e.is_unavailable() => Err(e),
        Err(e) => {
            debug!(
                "{}({:?}, {:?}) unreadable: {}",
                accessor.member_name(),
                request.section,
                request.key,
                e
            );
            Ok(None)
        }
    }
}

/// Read an INI entry and, when `request.value` is set, replace it and
/// persist according to `request.persist`.
#[instrument(skip(host), fields(section = %request.section, key = %request.key))]
pub fn access_config_value(
    host: &dyn AutomationHost,
    request: &ConfigRequest,
) -> Result<ConfigValue, AutomationError> {
    request.validate()?;
    let input = request
        .value
        .as_ref()
        .map(|value| coerce_ini_input(value, request.value_type))
        .transpose()?;

    let store = host.ini_store()?;
    let current = read_coerced(&*store, request)?;

    let Some(input) = input else {
        return Ok(ConfigValue {
            section: request.section.clone(),
            key: request.key.clone(),
            value_type: request.value_type,
            value: current,
            previous_value: None,
            applied: false,
        });
    };

    write_ini_value(
        &*store,
        request.value_type.accessor(),
        &request.section,
        &request.key,
        &input.to_host_value(),
    )?;
    let applied = persist_ini_changes(&*store, request.persist)?;
    let after = read_coerced(&*store, request)?;

    info!(
        "INI [{}] {} set to {} (applied: {})",
        request.section, request.key, input, applied
    );

    Ok(ConfigValue {
        section: request.section.clone(),
        key: request.key.clone(),
        value_type: request.value_type,
        value: after.or(Some(input)),
        previous_value: current,
        applied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::{IniCall, MemoryIniStore, WriteArity};

    #[test]
    fn input_coercion() {
        assert_eq!(
            coerce_ini_input(&IniValue::Str("yes".into()), IniValueType::Bool).unwrap(),
            IniValue::Bool(true)
        );
        assert_eq!(
            coerce_ini_input(&IniValue::Str("0".into()), IniValueType::Bool).unwrap(),
            IniValue::Bool(false)
        );
        assert_eq!(
            coerce_ini_input(&IniValue::Str("7".into()), IniValueType::Int).unwrap(),
            IniValue::Int(7)
        );
        assert_eq!(
            coerce_ini_input(&IniValue::Int(3), IniValueType::String).unwrap(),
            IniValue::Str("3".into())
        );
        assert_eq!(
            coerce_ini_input(&IniValue::Int(2), IniValueType::Bool).unwrap(),
            IniValue::Bool(true)
        );
    }

    #[test]
    fn non_numeric_int_input_is_rejected() {
        let err = coerce_ini_input(&IniValue::Str("lots".into()), IniValueType::Int).unwrap_err();
        assert!(matches!(err, AutomationError::InvalidArgument(_)));
    }

    #[test]
    fn result_coercion() {
        assert_eq!(
            coerce_ini_result(&HostValue::from("true"), IniValueType::Bool),
            Some(IniValue::Bool(true))
        );
        assert_eq!(
            coerce_ini_result(&HostValue::from("nope"), IniValueType::Bool),
            Some(IniValue::Bool(false))
        );
        assert_eq!(
            coerce_ini_result(&HostValue::from(" YES "), IniValueType::Bool),
            Some(IniValue::Bool(true))
        );
        assert_eq!(
            coerce_ini_result(&HostValue::Empty, IniValueType::Bool),
            Some(IniValue::Bool(false))
        );
        assert_eq!(
            coerce_ini_result(&HostValue::from("9"), IniValueType::Int),
            Some(IniValue::Int(9))
        );
        assert_eq!(
            coerce_ini_result(&HostValue::Int(5), IniValueType::String),
            Some(IniValue::Str("5".into()))
        );
    }

    #[test]
    fn non_numeric_int_result_does_not_fail() {
        assert_eq!(coerce_ini_result(&HostValue::from("n/a"), IniValueType::Int), None);
    }

    #[test]
    fn bool_round_trip_is_stable() {
        for raw in ["yes", "no", "1", "0", "on", "off", "garbage"] {
            let written = coerce_ini_input(&IniValue::Str(raw.into()), IniValueType::Bool).unwrap();
            let read = coerce_ini_result(&written.to_host_value(), IniValueType::Bool).unwrap();
            assert_eq!(read, written, "round trip changed {raw:?}");
        }
    }

    #[test]
    fn write_prefers_flags_argument() {
        let ini = MemoryIniStore::new().with_write_arity(WriteArity::RequiresFlags);
        write_ini_value(&ini, IniAccessor::StringValue, "Section", "Key", &"Value".into()).unwrap();
        assert_eq!(
            ini.calls(),
            vec![IniCall::Write {
                accessor: IniAccessor::StringValue,
                section: "Section".into(),
                key: "Key".into(),
                value: "Value".into(),
                flags: Some(0),
            }]
        );
    }

    #[test]
    fn write_retries_without_flags_on_signature_mismatch() {
        let ini = MemoryIniStore::new().with_write_arity(WriteArity::RejectsFlags);
        write_ini_value(&ini, IniAccessor::IntValue, "S", "K", &HostValue::Int(4)).unwrap();
        let writes: Vec<_> = ini
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                IniCall::Write { flags, .. } => Some(flags),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec![None]);
        assert_eq!(ini.raw("S", "K"), Some(HostValue::Int(4)));
    }

    #[test]
    fn genuine_write_errors_are_not_retried() {
        let ini = MemoryIniStore::new().with_failing_writes();
        let err = write_ini_value(&ini, IniAccessor::StringValue, "S", "K", &"v".into()).unwrap_err();
        assert!(matches!(err, AutomationError::PlatformError(_)));
        assert_eq!(ini.write_attempts(), 1);
    }

    #[test]
    fn apply_issues_apply_then_flush() {
        let ini = MemoryIniStore::new();
        assert!(persist_ini_changes(&ini, PersistMode::Apply).unwrap());
        assert_eq!(
            ini.calls(),
            vec![IniCall::Persist(PersistOp::Apply), IniCall::Persist(PersistOp::Flush)]
        );
    }

    #[test]
    fn apply_falls_back_to_whatever_is_exposed() {
        let ini = MemoryIniStore::new().without_op(PersistOp::Apply);
        assert!(persist_ini_changes(&ini, PersistMode::Apply).unwrap());
        assert_eq!(ini.calls(), vec![IniCall::Persist(PersistOp::Flush)]);

        let bare = MemoryIniStore::new()
            .without_op(PersistOp::Apply)
            .without_op(PersistOp::Flush);
        assert!(!persist_ini_changes(&bare, PersistMode::Apply).unwrap());
        assert!(bare.calls().is_empty());
    }

    #[test]
    fn none_and_flush_modes() {
        let ini = MemoryIniStore::new();
        assert!(!persist_ini_changes(&ini, PersistMode::None).unwrap());
        assert!(ini.calls().is_empty());
        assert!(persist_ini_changes(&ini, PersistMode::Flush).unwrap());
        assert_eq!(ini.calls(), vec![IniCall::Persist(PersistOp::Flush)]);
    }

    #[test]
    fn persist_mode_names() {
        let mode: PersistMode = serde_json::from_str("\"apply\"").unwrap();
        assert_eq!(mode, PersistMode::Apply);
        let ty: IniValueType = serde_json::from_str("\"int\"").unwrap();
        assert_eq!(ty, IniValueType::Int);
    }
}

use std::sync::Arc;

use globset::Glob;

use crate::commands::{CommandError, HandlerOutput};
use crate::context::ServerContext;
use crate::resp::RespValue;

pub struct KeysArguments {
    pub pattern: String,
}

impl KeysArguments {
    pub fn parse(args: Vec<String>) -> Result<Self, CommandError> {
        let [pattern] = args
            .try_into()
            .map_err(|_| CommandError::WrongArity("keys"))?;
        Ok(Self { pattern })
    }
}

/// KEYS replies the unexpired keys matching the glob pattern. `*`, prefix
/// globs, and exact names all go through the same matcher.
pub async fn keys(
    ctx: &Arc<ServerContext>,
    args: Vec<String>,
) -> Result<HandlerOutput, CommandError> {
    let arguments = KeysArguments::parse(args)?;

    let matcher = Glob::new(&arguments.pattern)
        .map_err(|_| CommandError::InvalidKeysPattern)?
        .compile_matcher();

    let mut matched: Vec<RespValue> = ctx
        .store
        .keys()
        .await
        .into_iter()
        .filter(|key| matcher.is_match(key))
        .map(RespValue::BulkString)
        .collect();

    // Deterministic reply order; the store map is unordered.
    matched.sort_by(|a, b| match (a, b) {
        (RespValue::BulkString(x), RespValue::BulkString(y)) => x.cmp(y),
        _ => std::cmp::Ordering::Equal,
    });

    Ok(HandlerOutput::reply(RespValue::Array(matched)))
}

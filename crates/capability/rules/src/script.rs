//! 规则脚本执行。
//!
//! 每次执行创建独立的 Lua 解释器，只开放 `table`/`string`/`math`/`utf8` 标准库，
//! 通过指令计数钩子强制执行时限，并限制解释器内存。
//! 另注册 `aes_encrypt` / `aes_decrypt` 两个全局函数。

use crate::crypto::{CryptoError, aes_cbc_decrypt, aes_cbc_encrypt, decode_params};
use conduit_storage::ScriptType;
use domain::Message;
use mlua::{HookTriggers, IntoLuaMulti, Lua, LuaOptions, MultiValue, StdLib, Table, Value, VmState};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 钩子检查间隔（指令数）。
const HOOK_INSTRUCTION_INTERVAL: u32 = 1000;
/// 单个解释器的默认内存上限。
const DEFAULT_MEMORY_LIMIT: usize = 16 * 1024 * 1024;

/// 脚本执行错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("script runtime error: {0}")]
    Runtime(String),
    #[error("script exceeded time limit")]
    Timeout,
    #[error("unsupported script: {0}")]
    Unsupported(String),
    #[error("script sandbox error: {0}")]
    Sandbox(String),
}

/// 脚本执行器。
///
/// 返回 `None` 表示脚本没有产出（nil 或 false），调用方不发布任何消息。
pub trait ScriptExecutor: Send + Sync {
    fn execute(&self, source: &str, message: &Message) -> Result<Option<Vec<u8>>, ScriptError>;

    /// 单次执行的时限。调用方在阻塞线程外再套一层超时，
    /// 覆盖解释器钩子打断不了的 C 函数调用。
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// Lua 5.4 执行器。
pub struct LuaExecutor {
    timeout: Duration,
    memory_limit: usize,
}

impl LuaExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }

    fn sandbox(&self, timed_out: Arc<AtomicBool>) -> Result<Lua, ScriptError> {
        let libs = StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8;
        let lua = Lua::new_with(libs, LuaOptions::default()).map_err(sandbox_error)?;
        lua.set_memory_limit(self.memory_limit)
            .map_err(sandbox_error)?;

        let deadline = Instant::now() + self.timeout;
        lua.set_hook(
            HookTriggers::new().every_nth_instruction(HOOK_INSTRUCTION_INTERVAL),
            move |_lua, _debug| {
                if Instant::now() >= deadline {
                    timed_out.store(true, Ordering::Relaxed);
                    return Err(mlua::Error::runtime("execution time limit exceeded"));
                }
                Ok(VmState::Continue)
            },
        );
        Ok(lua)
    }
}

impl ScriptExecutor for LuaExecutor {
    fn timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }

    fn execute(&self, source: &str, message: &Message) -> Result<Option<Vec<u8>>, ScriptError> {
        let timed_out = Arc::new(AtomicBool::new(false));
        let lua = self.sandbox(timed_out.clone())?;
        let runtime_error = |err: mlua::Error| {
            if timed_out.load(Ordering::Relaxed) {
                ScriptError::Timeout
            } else {
                ScriptError::Runtime(err.to_string())
            }
        };

        let input = message_table(&lua, message).map_err(sandbox_error)?;
        lua.globals()
            .set("message", input)
            .map_err(sandbox_error)?;
        register_crypto(&lua).map_err(sandbox_error)?;

        let values = lua
            .load(source)
            .set_name("rule")
            .eval::<MultiValue>()
            .map_err(runtime_error)?;
        match values.into_iter().last() {
            Some(value) => script_output(value),
            None => Ok(None),
        }
    }
}

/// 按脚本类型选择执行器。
pub struct ScriptRegistry {
    executors: HashMap<ScriptType, Arc<dyn ScriptExecutor>>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// 注册 Lua 执行器。
    pub fn with_lua(timeout: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(ScriptType::Lua, Arc::new(LuaExecutor::new(timeout)));
        registry
    }

    pub fn register(&mut self, script_type: ScriptType, executor: Arc<dyn ScriptExecutor>) {
        self.executors.insert(script_type, executor);
    }

    pub fn get(&self, script_type: ScriptType) -> Result<Arc<dyn ScriptExecutor>, ScriptError> {
        self.executors
            .get(&script_type)
            .cloned()
            .ok_or_else(|| ScriptError::Unsupported(script_type.as_str().to_string()))
    }
}

impl Default for ScriptRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn sandbox_error(err: mlua::Error) -> ScriptError {
    ScriptError::Sandbox(err.to_string())
}

/// 构造只读的 `message` 全局表，payload 为从 1 开始的字节数组。
fn message_table(lua: &Lua, message: &Message) -> mlua::Result<Table> {
    let fields = lua.create_table()?;
    fields.set("channel", message.channel.as_str())?;
    fields.set("subtopic", message.subtopic.as_str())?;
    fields.set("publisher", message.publisher.as_str())?;
    fields.set("protocol", message.protocol.as_str())?;
    fields.set("created", message.created)?;
    fields.set(
        "payload",
        lua.create_sequence_from(message.payload.iter().copied())?,
    )?;

    let meta = lua.create_table()?;
    meta.set("__index", fields)?;
    meta.set(
        "__newindex",
        lua.create_function(|_, _: mlua::MultiValue| -> mlua::Result<()> {
            Err(mlua::Error::runtime("message is read-only"))
        })?,
    )?;
    let proxy = lua.create_table()?;
    proxy.set_metatable(Some(meta));
    Ok(proxy)
}

type CryptoArgs = (Option<String>, Option<String>, Option<String>);
type CipherFn = fn(&[u8], &[u8], &[u8]) -> Result<Vec<u8>, CryptoError>;

/// 注册 AES-CBC 函数：参数为十六进制的 key、iv、data，成功返回十六进制结果，
/// 失败返回 `nil, 错误信息`。
fn register_crypto(lua: &Lua) -> mlua::Result<()> {
    let globals = lua.globals();
    globals.set(
        "aes_encrypt",
        lua.create_function(|lua, args: CryptoArgs| crypto_call(lua, args, "encrypt", aes_cbc_encrypt))?,
    )?;
    globals.set(
        "aes_decrypt",
        lua.create_function(|lua, args: CryptoArgs| crypto_call(lua, args, "decrypt", aes_cbc_decrypt))?,
    )?;
    Ok(())
}

fn crypto_call(lua: &Lua, args: CryptoArgs, op: &str, cipher: CipherFn) -> mlua::Result<MultiValue> {
    let (key, iv, data) = args;
    let params = decode_params(
        key.as_deref().unwrap_or_default(),
        iv.as_deref().unwrap_or_default(),
        data.as_deref().unwrap_or_default(),
    );
    let (key, iv, data) = match params {
        Ok(params) => params,
        Err(err) => return (Value::Nil, format!("failed to decode params: {err}")).into_lua_multi(lua),
    };
    match cipher(&key, &iv, &data) {
        Ok(output) => hex::encode(output).into_lua_multi(lua),
        Err(err) => (Value::Nil, format!("failed to {op}: {err}")).into_lua_multi(lua),
    }
}

/// 脚本结果转为输出 payload。
///
/// 字符串原样输出；数字与 true 输出文本形式；nil 与 false 视为无输出；
/// 元素均为 0..=255 整数的数组按原始字节输出，其余表序列化为 JSON。
fn script_output(value: Value) -> Result<Option<Vec<u8>>, ScriptError> {
    match value {
        Value::Nil | Value::Boolean(false) => Ok(None),
        Value::Boolean(true) => Ok(Some(b"true".to_vec())),
        Value::Integer(number) => Ok(Some(number.to_string().into_bytes())),
        Value::Number(number) => Ok(Some(number.to_string().into_bytes())),
        Value::String(text) => Ok(Some(text.as_bytes().to_vec())),
        Value::Table(table) => {
            if let Some(bytes) = byte_sequence(&table) {
                return Ok(Some(bytes));
            }
            serde_json::to_vec(&Value::Table(table))
                .map(Some)
                .map_err(|err| ScriptError::Unsupported(err.to_string()))
        }
        other => Err(ScriptError::Unsupported(other.type_name().to_string())),
    }
}

fn byte_sequence(table: &Table) -> Option<Vec<u8>> {
    let len = table.raw_len();
    if len == 0 || table.clone().pairs::<Value, Value>().count() != len {
        return None;
    }
    let mut bytes = Vec::with_capacity(len);
    for index in 1..=len {
        let value: mlua::Result<Value> = table.raw_get(index);
        match value {
            Ok(Value::Integer(byte)) => bytes.push(u8::try_from(byte).ok()?),
            _ => return None,
        }
    }
    Some(bytes)
}

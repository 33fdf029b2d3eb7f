// FFI bridge for reelplay
// C ABI + JNI entrypoints over one process-wide command gateway.
//
// Every entrypoint takes a method name and a JSON argument object and
// answers with `{"ok": value}` or `{"error": {"code", "message", "details"}}`.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use reelplay_player::{response_to_json, Gateway, MethodCall, PlayerConfig, PlayerError, Result};
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::sync::{Arc, Once};

static GATEWAY: Lazy<Mutex<Option<Arc<Gateway>>>> = Lazy::new(|| Mutex::new(None));
static INIT_LOGGER: Once = Once::new();

fn init_logging() {
    INIT_LOGGER.call_once(|| {
        #[cfg(target_os = "android")]
        {
            android_logger::init_once(
                android_logger::Config::default()
                    .with_max_level(log::LevelFilter::Info)
                    .with_tag("reelplay"),
            );
        }

        #[cfg(not(target_os = "android"))]
        {
            let _ = env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or("info"),
            )
            .try_init();
        }
    });
}

/// The process-wide gateway, started on first use.
///
/// The lock is released before the caller touches the gateway, so reply
/// callbacks may re-enter any entrypoint.
fn shared_gateway() -> Result<Arc<Gateway>> {
    init_logging();
    let mut slot = GATEWAY.lock();
    if let Some(gateway) = slot.as_ref() {
        return Ok(Arc::clone(gateway));
    }
    let gateway = Arc::new(Gateway::spawn_default(PlayerConfig::default())?);
    *slot = Some(Arc::clone(&gateway));
    log::info!("[ffi] gateway started");
    Ok(gateway)
}

/// Stop the process-wide gateway: queued commands finish, the session is
/// disposed. Returns false when nothing was running.
fn shutdown_gateway() -> bool {
    let gateway = GATEWAY.lock().take();
    match gateway {
        Some(gateway) => {
            drop(gateway);
            log::info!("[ffi] gateway stopped");
            true
        }
        None => false,
    }
}

/// Route one call and hand its JSON response to `respond`
fn invoke_json<R>(method: &str, arguments: &str, respond: R) -> Result<()>
where
    R: FnOnce(String) + Send + 'static,
{
    let call = match MethodCall::from_json(method, arguments) {
        Ok(call) => call,
        Err(err) => {
            respond(response_to_json(&Err(err)).to_string());
            return Ok(());
        }
    };
    let gateway = shared_gateway()?;
    gateway.invoke_with(call, move |response| {
        respond(response_to_json(&response).to_string());
    });
    Ok(())
}

/// Same as [`invoke_json`] but blocks for the response
fn call_json(method: &str, arguments: &str) -> Result<String> {
    let call = match MethodCall::from_json(method, arguments) {
        Ok(call) => call,
        Err(err) => return Ok(response_to_json(&Err(err)).to_string()),
    };
    let response = shared_gateway()?.invoke(call).wait();
    Ok(response_to_json(&response).to_string())
}

fn to_code(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            log::error!("[ffi] {}", err);
            -1
        }
    }
}

fn c_str_arg<'a>(ptr: *const c_char, name: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(PlayerError::InvalidArgument(name.to_string()));
    }
    // SAFETY: non-null and, per the C contract, NUL-terminated and valid for
    // the duration of the call.
    let c_str = unsafe { CStr::from_ptr(ptr) };
    c_str
        .to_str()
        .map_err(|_| PlayerError::InvalidArgument(name.to_string()))
}

fn optional_c_str_arg<'a>(ptr: *const c_char, name: &str) -> Result<&'a str> {
    if ptr.is_null() {
        Ok("")
    } else {
        c_str_arg(ptr, name)
    }
}

// -----------------------------------------------------------------------------
// C ABI
// -----------------------------------------------------------------------------

/// Receives a NUL-terminated JSON response. The string is only valid for the
/// duration of the call.
pub type ResponseCallback = extern "C" fn(user_data: *mut c_void, response_json: *const c_char);

struct CallbackTarget {
    callback: ResponseCallback,
    user_data: *mut c_void,
}

// SAFETY: the host promises `user_data` may be used from the dispatcher
// thread; we only pass it back to the host's own callback.
unsafe impl Send for CallbackTarget {}

impl CallbackTarget {
    fn deliver(self, json: String) {
        match CString::new(json) {
            Ok(json) => (self.callback)(self.user_data, json.as_ptr()),
            Err(err) => log::error!("[ffi] response contains NUL: {}", err),
        }
    }
}

/// Submit a call. The callback runs exactly once, usually on the dispatcher
/// thread. Returns 0 when accepted, -1 when the call could not be routed.
#[no_mangle]
pub extern "C" fn reelplay_invoke(
    method: *const c_char,
    arguments_json: *const c_char,
    callback: Option<ResponseCallback>,
    user_data: *mut c_void,
) -> i32 {
    let result = c_str_arg(method, "method").and_then(|method| {
        let arguments = optional_c_str_arg(arguments_json, "arguments")?;
        match callback {
            Some(callback) => {
                let target = CallbackTarget {
                    callback,
                    user_data,
                };
                invoke_json(method, arguments, move |json| target.deliver(json))
            }
            None => invoke_json(method, arguments, |_| {}),
        }
    });
    to_code(result)
}

/// Run a call and block for its JSON response. Free the result with
/// [`reelplay_string_free`]. Returns null when the call could not be routed.
///
/// Must not be called from inside a response callback.
#[no_mangle]
pub extern "C" fn reelplay_call(method: *const c_char, arguments_json: *const c_char) -> *mut c_char {
    let result = c_str_arg(method, "method").and_then(|method| {
        let arguments = optional_c_str_arg(arguments_json, "arguments")?;
        call_json(method, arguments)
    });
    match result.map(CString::new) {
        Ok(Ok(json)) => json.into_raw(),
        Ok(Err(err)) => {
            log::error!("[ffi] response contains NUL: {}", err);
            std::ptr::null_mut()
        }
        Err(err) => {
            log::error!("[ffi] {}", err);
            std::ptr::null_mut()
        }
    }
}

/// Free a string returned by [`reelplay_call`]
#[no_mangle]
pub extern "C" fn reelplay_string_free(json: *mut c_char) {
    if json.is_null() {
        return;
    }
    // SAFETY: produced by CString::into_raw in reelplay_call
    drop(unsafe { CString::from_raw(json) });
}

/// Dispose the session and stop the dispatcher. Returns 0 when something was
/// running, 1 when already stopped.
#[no_mangle]
pub extern "C" fn reelplay_shutdown() -> i32 {
    if shutdown_gateway() {
        0
    } else {
        1
    }
}

// -------------------------------
// JNI bindings for Android/JVM
// -------------------------------
#[cfg(any(feature = "android", feature = "desktop"))]
mod jni_bridge {
    use super::*;
    use jni::objects::{GlobalRef, JClass, JObject, JString, JValue};
    use jni::sys::{jint, jstring};
    use jni::{JNIEnv, JavaVM};

    fn jstring_to_string(env: &mut JNIEnv, jstr: &JString) -> Result<String> {
        let java_str = env
            .get_string(jstr)
            .map_err(|e| PlayerError::InvalidArgument(e.to_string()))?;
        Ok(java_str.into())
    }

    /// Call `listener.onResult(json)` from whatever thread the response lands on
    fn deliver(vm: &JavaVM, listener: &GlobalRef, json: &str) {
        let mut env = match vm.attach_current_thread_permanently() {
            Ok(env) => env,
            Err(err) => {
                log::error!("[jni] failed to attach thread: {}", err);
                return;
            }
        };
        let jstr = match env.new_string(json) {
            Ok(jstr) => jstr,
            Err(err) => {
                log::error!("[jni] failed to create response string: {}", err);
                return;
            }
        };
        if let Err(err) = env.call_method(
            listener,
            "onResult",
            "(Ljava/lang/String;)V",
            &[JValue::Object(&jstr)],
        ) {
            log::error!("[jni] onResult failed: {}", err);
            let _ = env.exception_clear();
        }
    }

    #[no_mangle]
    pub extern "system" fn Java_com_reelplay_player_NativePlayer_nativeInvoke(
        mut env: JNIEnv,
        _class: JClass,
        method: JString,
        arguments_json: JString,
        listener: JObject,
    ) -> jint {
        let method = match jstring_to_string(&mut env, &method) {
            Ok(method) => method,
            Err(err) => {
                log::error!("[jni] failed to read method: {}", err);
                return -1;
            }
        };
        let arguments = if arguments_json.is_null() {
            String::new()
        } else {
            match jstring_to_string(&mut env, &arguments_json) {
                Ok(arguments) => arguments,
                Err(err) => {
                    log::error!("[jni] failed to read arguments: {}", err);
                    return -1;
                }
            }
        };

        let vm = match env.get_java_vm() {
            Ok(vm) => vm,
            Err(err) => {
                log::error!("[jni] failed to get JavaVM: {}", err);
                return -1;
            }
        };
        let listener = match env.new_global_ref(&listener) {
            Ok(listener) => listener,
            Err(err) => {
                log::error!("[jni] failed to pin listener: {}", err);
                return -1;
            }
        };

        to_code(invoke_json(&method, &arguments, move |json| {
            deliver(&vm, &listener, &json)
        })) as jint
    }

    #[no_mangle]
    pub extern "system" fn Java_com_reelplay_player_NativePlayer_nativeCall(
        mut env: JNIEnv,
        _class: JClass,
        method: JString,
        arguments_json: JString,
    ) -> jstring {
        let json = jstring_to_string(&mut env, &method).and_then(|method| {
            let arguments = if arguments_json.is_null() {
                String::new()
            } else {
                jstring_to_string(&mut env, &arguments_json)?
            };
            call_json(&method, &arguments)
        });
        match json {
            Ok(json) => env
                .new_string(json)
                .map(|j| j.into_raw())
                .unwrap_or(std::ptr::null_mut()),
            Err(err) => {
                log::error!("[jni] {}", err);
                std::ptr::null_mut()
            }
        }
    }

    #[no_mangle]
    pub extern "system" fn Java_com_reelplay_player_NativePlayer_nativeShutdown(
        _env: JNIEnv,
        _class: JClass,
    ) -> jint {
        reelplay_shutdown() as jint
    }
}

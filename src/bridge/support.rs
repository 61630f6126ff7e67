//! C++ support code every generated unit is compiled against
//!
//! The header declares one `NJB_API` function per [`BridgeOp`] (plus a few inline helpers for
//! constants). The source implements them on top of JNI, including the JVM semantics that plain
//! C++ arithmetic does not give for free: checked integer division, masked shifts, saturating
//! float conversions, and NaN-aware comparisons.

use super::{BridgeOp, BRIDGE_VERSION};

/// File name under which the header is written (units include it relative to their directory)
pub const SUPPORT_HEADER_NAME: &str = "jvm2native_bridge.hpp";

/// File name under which the support source is written
pub const SUPPORT_SOURCE_NAME: &str = "jvm2native_bridge.cpp";

/// Return type and parameter list of the C function behind an operation
fn signature(op: BridgeOp) -> (&'static str, &'static str) {
    use BridgeOp::*;
    match op {
        ResolveClass => (
            "jclass",
            "JNIEnv* env, std::atomic<jclass>* slot, const char* name",
        ),
        ResolveMethod => (
            "jmethodID",
            "JNIEnv* env, std::atomic<jmethodID>* slot, jclass clazz, const char* name, const char* descriptor, jboolean is_static",
        ),
        ResolveField => (
            "jfieldID",
            "JNIEnv* env, std::atomic<jfieldID>* slot, jclass clazz, const char* name, const char* descriptor, jboolean is_static",
        ),
        Decode => (
            "const char*",
            "std::once_flag* once, char* out, const unsigned char* encoded, jsize length, jlong key, jint index",
        ),
        TakeException => ("jthrowable", "JNIEnv* env"),
        LoadString => (
            "jstring",
            "JNIEnv* env, std::atomic<jstring>* slot, const char* value",
        ),
        LoadClass => ("jobject", "JNIEnv* env, jclass clazz"),
        Allocate => ("jobject", "JNIEnv* env, jclass clazz"),
        InvokeVirtual | InvokeInterface => (
            "jvalue",
            "JNIEnv* env, jobject receiver, jmethodID method, const char* descriptor, const jvalue* args",
        ),
        InvokeSpecial => (
            "jvalue",
            "JNIEnv* env, jobject receiver, jclass clazz, jmethodID method, const char* descriptor, const jvalue* args",
        ),
        InvokeStatic => (
            "jvalue",
            "JNIEnv* env, jclass clazz, jmethodID method, const char* descriptor, const jvalue* args",
        ),
        GetField => (
            "jvalue",
            "JNIEnv* env, jobject object, jfieldID field, char type",
        ),
        SetField => (
            "void",
            "JNIEnv* env, jobject object, jfieldID field, char type, jvalue value",
        ),
        GetStatic => ("jvalue", "JNIEnv* env, jclass clazz, jfieldID field, char type"),
        SetStatic => (
            "void",
            "JNIEnv* env, jclass clazz, jfieldID field, char type, jvalue value",
        ),
        Throw => ("void", "JNIEnv* env, jobject object"),
        MonitorEnter | MonitorExit => ("void", "JNIEnv* env, jobject object"),
        NewArray => ("jobject", "JNIEnv* env, char type, jint length"),
        NewObjectArray => ("jobject", "JNIEnv* env, jclass element, jint length"),
        NewMultiArray => (
            "jobject",
            "JNIEnv* env, jclass array_class, jint dimensions, const jint* lengths",
        ),
        ArrayLength => ("jint", "JNIEnv* env, jobject array"),
        ArrayLoad => ("jvalue", "JNIEnv* env, jobject array, jint index, char type"),
        ArrayStore => (
            "void",
            "JNIEnv* env, jobject array, jint index, char type, jvalue value",
        ),
        CheckCast => ("jobject", "JNIEnv* env, jobject object, jclass clazz"),
        InstanceOf => ("jint", "JNIEnv* env, jobject object, jclass clazz"),
        SameObject => ("jint", "JNIEnv* env, jobject a, jobject b"),
        IntDiv | IntRem => ("jint", "JNIEnv* env, jint a, jint b"),
        LongDiv | LongRem => ("jlong", "JNIEnv* env, jlong a, jlong b"),
        IntShl | IntShr | IntUShr => ("jint", "jint value, jint count"),
        LongShl | LongShr | LongUShr => ("jlong", "jlong value, jint count"),
        FloatToInt => ("jint", "jfloat value"),
        FloatToLong => ("jlong", "jfloat value"),
        DoubleToInt => ("jint", "jdouble value"),
        DoubleToLong => ("jlong", "jdouble value"),
        LongCompare => ("jint", "jlong a, jlong b"),
        FloatCompareL | FloatCompareG => ("jint", "jfloat a, jfloat b"),
        DoubleCompareL | DoubleCompareG => ("jint", "jdouble a, jdouble b"),
        FloatRem => ("jfloat", "jfloat a, jfloat b"),
        DoubleRem => ("jdouble", "jdouble a, jdouble b"),
    }
}

/// Contents of the bridge header
pub fn support_header() -> String {
    let mut header = format!(
        r#"// Generated by jvm2native. Do not edit.
#pragma once

#include <jni.h>

#include <atomic>
#include <cmath>
#include <cstdint>
#include <cstring>
#include <mutex>

#define NJB_BRIDGE_VERSION {}
#define NJB_API extern "C"

"#,
        BRIDGE_VERSION
    );
    for op in BridgeOp::ALL {
        let (ret, params) = signature(*op);
        header.push_str(&format!("NJB_API {} {}({});\n", ret, op.symbol(), params));
    }
    header.push_str(HEADER_HELPERS);
    header
}

/// Contents of the bridge support source
pub fn support_source() -> String {
    format!(
        "// Generated by jvm2native. Do not edit.\n#include \"{}\"\n{}",
        SUPPORT_HEADER_NAME, SUPPORT_SOURCE
    )
}

const HEADER_HELPERS: &str = r#"
inline jfloat njb_float_bits(uint32_t bits) {
    jfloat value;
    std::memcpy(&value, &bits, sizeof value);
    return value;
}

inline jdouble njb_double_bits(uint64_t bits) {
    jdouble value;
    std::memcpy(&value, &bits, sizeof value);
    return value;
}

// Numeric constants are stored big-endian in the protected pool
inline jint njb_be_int(const char* bytes) {
    const unsigned char* b = reinterpret_cast<const unsigned char*>(bytes);
    return (jint)(((uint32_t)b[0] << 24) | ((uint32_t)b[1] << 16) | ((uint32_t)b[2] << 8) | (uint32_t)b[3]);
}

inline jlong njb_be_long(const char* bytes) {
    const unsigned char* b = reinterpret_cast<const unsigned char*>(bytes);
    uint64_t value = 0;
    for (int i = 0; i < 8; i++) {
        value = (value << 8) | b[i];
    }
    return (jlong)value;
}

inline jfloat njb_be_float(const char* bytes) {
    return njb_float_bits((uint32_t)njb_be_int(bytes));
}

inline jdouble njb_be_double(const char* bytes) {
    return njb_double_bits((uint64_t)njb_be_long(bytes));
}
"#;

const SUPPORT_SOURCE: &str = r#"
#include <cstdio>
#include <string>

namespace {

uint8_t next_key_byte(uint64_t& state) {
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    return (uint8_t)((state * 0x2545F4914F6CDD1DULL) >> 56);
}

void throw_new(JNIEnv* env, const char* class_name, const char* message) {
    jclass clazz = env->FindClass(class_name);
    if (clazz != nullptr) {
        env->ThrowNew(clazz, message);
        env->DeleteLocalRef(clazz);
    }
}

// `Class.getName()` of a class, or "?" if it cannot be had
std::string class_name_of(JNIEnv* env, jclass clazz) {
    std::string name = "?";
    jclass class_class = env->GetObjectClass(clazz);
    jmethodID get_name = env->GetMethodID(class_class, "getName", "()Ljava/lang/String;");
    env->DeleteLocalRef(class_class);
    jstring value = get_name == nullptr ? nullptr : (jstring)env->CallObjectMethod(clazz, get_name);
    if (env->ExceptionCheck()) {
        env->ExceptionClear();
    }
    if (value == nullptr) {
        return name;
    }
    const char* chars = env->GetStringUTFChars(value, nullptr);
    if (chars != nullptr) {
        name = chars;
        env->ReleaseStringUTFChars(value, chars);
    }
    env->DeleteLocalRef(value);
    return name;
}

bool null_check(JNIEnv* env, jobject object) {
    if (object == nullptr) {
        throw_new(env, "java/lang/NullPointerException", nullptr);
        return false;
    }
    return true;
}

bool length_check(JNIEnv* env, jint length) {
    if (length < 0) {
        char message[16];
        std::snprintf(message, sizeof message, "%d", (int)length);
        throw_new(env, "java/lang/NegativeArraySizeException", message);
        return false;
    }
    return true;
}

bool index_check(JNIEnv* env, jobject array, jint index) {
    jsize length = env->GetArrayLength((jarray)array);
    if (index < 0 || index >= length) {
        char message[64];
        std::snprintf(message, sizeof message, "Index %d out of bounds for length %d", (int)index, (int)length);
        throw_new(env, "java/lang/ArrayIndexOutOfBoundsException", message);
        return false;
    }
    return true;
}

template <typename T>
T cache(JNIEnv* env, std::atomic<T>* slot, T resolved) {
    T expected = nullptr;
    if (slot->compare_exchange_strong(expected, resolved, std::memory_order_acq_rel)) {
        return resolved;
    }
    env->DeleteGlobalRef(resolved);
    return expected;
}

// `baload` and `bastore` are shared between byte[] and boolean[]
bool is_boolean_array(JNIEnv* env, jobject array) {
    static std::atomic<jclass> boolean_array{nullptr};
    jclass clazz = njb_resolve_class(env, &boolean_array, "[Z");
    return clazz != nullptr && env->IsInstanceOf(array, clazz);
}

// Narrow slot values to the parameter types, returning the return type character
char narrow_args(const char* descriptor, const jvalue* args, jvalue* narrowed) {
    const char* p = descriptor + 1;
    int i = 0;
    while (*p != ')') {
        jvalue value = args[i];
        switch (*p) {
            case 'Z': narrowed[i].z = (jboolean)(value.i & 1); break;
            case 'B': narrowed[i].b = (jbyte)value.i; break;
            case 'C': narrowed[i].c = (jchar)value.i; break;
            case 'S': narrowed[i].s = (jshort)value.i; break;
            default: narrowed[i] = value; break;
        }
        while (*p == '[') {
            p++;
        }
        if (*p == 'L') {
            while (*p != ';') {
                p++;
            }
        }
        p++;
        i++;
    }
    return p[1];
}

enum class Dispatch { Virtual, Nonvirtual, Static };

jvalue call(JNIEnv* env, Dispatch dispatch, jobject receiver, jclass clazz, jmethodID method, const char* descriptor, const jvalue* args) {
    jvalue result = {};
    jvalue narrowed[256];
    char type = narrow_args(descriptor, args, narrowed);
    switch (dispatch) {
        case Dispatch::Virtual:
            switch (type) {
                case 'V': env->CallVoidMethodA(receiver, method, narrowed); break;
                case 'Z': result.i = env->CallBooleanMethodA(receiver, method, narrowed); break;
                case 'B': result.i = env->CallByteMethodA(receiver, method, narrowed); break;
                case 'C': result.i = env->CallCharMethodA(receiver, method, narrowed); break;
                case 'S': result.i = env->CallShortMethodA(receiver, method, narrowed); break;
                case 'I': result.i = env->CallIntMethodA(receiver, method, narrowed); break;
                case 'J': result.j = env->CallLongMethodA(receiver, method, narrowed); break;
                case 'F': result.f = env->CallFloatMethodA(receiver, method, narrowed); break;
                case 'D': result.d = env->CallDoubleMethodA(receiver, method, narrowed); break;
                default: result.l = env->CallObjectMethodA(receiver, method, narrowed); break;
            }
            break;
        case Dispatch::Nonvirtual:
            switch (type) {
                case 'V': env->CallNonvirtualVoidMethodA(receiver, clazz, method, narrowed); break;
                case 'Z': result.i = env->CallNonvirtualBooleanMethodA(receiver, clazz, method, narrowed); break;
                case 'B': result.i = env->CallNonvirtualByteMethodA(receiver, clazz, method, narrowed); break;
                case 'C': result.i = env->CallNonvirtualCharMethodA(receiver, clazz, method, narrowed); break;
                case 'S': result.i = env->CallNonvirtualShortMethodA(receiver, clazz, method, narrowed); break;
                case 'I': result.i = env->CallNonvirtualIntMethodA(receiver, clazz, method, narrowed); break;
                case 'J': result.j = env->CallNonvirtualLongMethodA(receiver, clazz, method, narrowed); break;
                case 'F': result.f = env->CallNonvirtualFloatMethodA(receiver, clazz, method, narrowed); break;
                case 'D': result.d = env->CallNonvirtualDoubleMethodA(receiver, clazz, method, narrowed); break;
                default: result.l = env->CallNonvirtualObjectMethodA(receiver, clazz, method, narrowed); break;
            }
            break;
        case Dispatch::Static:
            switch (type) {
                case 'V': env->CallStaticVoidMethodA(clazz, method, narrowed); break;
                case 'Z': result.i = env->CallStaticBooleanMethodA(clazz, method, narrowed); break;
                case 'B': result.i = env->CallStaticByteMethodA(clazz, method, narrowed); break;
                case 'C': result.i = env->CallStaticCharMethodA(clazz, method, narrowed); break;
                case 'S': result.i = env->CallStaticShortMethodA(clazz, method, narrowed); break;
                case 'I': result.i = env->CallStaticIntMethodA(clazz, method, narrowed); break;
                case 'J': result.j = env->CallStaticLongMethodA(clazz, method, narrowed); break;
                case 'F': result.f = env->CallStaticFloatMethodA(clazz, method, narrowed); break;
                case 'D': result.d = env->CallStaticDoubleMethodA(clazz, method, narrowed); break;
                default: result.l = env->CallStaticObjectMethodA(clazz, method, narrowed); break;
            }
            break;
    }
    return result;
}

} // namespace

NJB_API jclass njb_resolve_class(JNIEnv* env, std::atomic<jclass>* slot, const char* name) {
    jclass cached = slot->load(std::memory_order_acquire);
    if (cached != nullptr) {
        return cached;
    }
    jclass local = env->FindClass(name);
    if (local == nullptr) {
        return nullptr;
    }
    jclass global = (jclass)env->NewGlobalRef(local);
    env->DeleteLocalRef(local);
    return cache(env, slot, global);
}

NJB_API jmethodID njb_resolve_method(JNIEnv* env, std::atomic<jmethodID>* slot, jclass clazz, const char* name, const char* descriptor, jboolean is_static) {
    jmethodID cached = slot->load(std::memory_order_acquire);
    if (cached != nullptr) {
        return cached;
    }
    jmethodID id = is_static ? env->GetStaticMethodID(clazz, name, descriptor) : env->GetMethodID(clazz, name, descriptor);
    if (id != nullptr) {
        slot->store(id, std::memory_order_release);
    }
    return id;
}

NJB_API jfieldID njb_resolve_field(JNIEnv* env, std::atomic<jfieldID>* slot, jclass clazz, const char* name, const char* descriptor, jboolean is_static) {
    jfieldID cached = slot->load(std::memory_order_acquire);
    if (cached != nullptr) {
        return cached;
    }
    jfieldID id = is_static ? env->GetStaticFieldID(clazz, name, descriptor) : env->GetFieldID(clazz, name, descriptor);
    if (id != nullptr) {
        slot->store(id, std::memory_order_release);
    }
    return id;
}

NJB_API const char* njb_decode(std::once_flag* once, char* out, const unsigned char* encoded, jsize length, jlong key, jint index) {
    std::call_once(*once, [=]() {
        uint64_t state = (uint64_t)key | 1;
        for (jsize j = 0; j < length; j++) {
            unsigned rotation = (unsigned)((j + index) % 8);
            uint8_t byte = encoded[j];
            uint8_t rotated = rotation == 0 ? byte : (uint8_t)((byte >> rotation) | (byte << (8 - rotation)));
            out[j] = (char)(rotated ^ next_key_byte(state));
        }
        out[length] = 0;
    });
    return out;
}

NJB_API jthrowable njb_take_exception(JNIEnv* env) {
    jthrowable thrown = env->ExceptionOccurred();
    env->ExceptionClear();
    return thrown;
}

NJB_API jstring njb_load_string(JNIEnv* env, std::atomic<jstring>* slot, const char* value) {
    jstring cached = slot->load(std::memory_order_acquire);
    if (cached != nullptr) {
        return cached;
    }
    jstring local = env->NewStringUTF(value);
    if (local == nullptr) {
        return nullptr;
    }
    jclass string_class = env->GetObjectClass(local);
    jmethodID intern = env->GetMethodID(string_class, "intern", "()Ljava/lang/String;");
    jstring interned = (jstring)env->CallObjectMethod(local, intern);
    env->DeleteLocalRef(string_class);
    env->DeleteLocalRef(local);
    if (env->ExceptionCheck()) {
        return nullptr;
    }
    jstring global = (jstring)env->NewGlobalRef(interned);
    env->DeleteLocalRef(interned);
    return cache(env, slot, global);
}

NJB_API jobject njb_load_class(JNIEnv* env, jclass clazz) {
    return env->NewLocalRef(clazz);
}

NJB_API jobject njb_allocate(JNIEnv* env, jclass clazz) {
    return env->AllocObject(clazz);
}

NJB_API jvalue njb_invoke_virtual(JNIEnv* env, jobject receiver, jmethodID method, const char* descriptor, const jvalue* args) {
    if (!null_check(env, receiver)) {
        return jvalue{};
    }
    return call(env, Dispatch::Virtual, receiver, nullptr, method, descriptor, args);
}

NJB_API jvalue njb_invoke_interface(JNIEnv* env, jobject receiver, jmethodID method, const char* descriptor, const jvalue* args) {
    if (!null_check(env, receiver)) {
        return jvalue{};
    }
    return call(env, Dispatch::Virtual, receiver, nullptr, method, descriptor, args);
}

NJB_API jvalue njb_invoke_special(JNIEnv* env, jobject receiver, jclass clazz, jmethodID method, const char* descriptor, const jvalue* args) {
    if (!null_check(env, receiver)) {
        return jvalue{};
    }
    return call(env, Dispatch::Nonvirtual, receiver, clazz, method, descriptor, args);
}

NJB_API jvalue njb_invoke_static(JNIEnv* env, jclass clazz, jmethodID method, const char* descriptor, const jvalue* args) {
    return call(env, Dispatch::Static, nullptr, clazz, method, descriptor, args);
}

NJB_API jvalue njb_get_field(JNIEnv* env, jobject object, jfieldID field, char type) {
    jvalue result = {};
    if (!null_check(env, object)) {
        return result;
    }
    switch (type) {
        case 'Z': result.i = env->GetBooleanField(object, field); break;
        case 'B': result.i = env->GetByteField(object, field); break;
        case 'C': result.i = env->GetCharField(object, field); break;
        case 'S': result.i = env->GetShortField(object, field); break;
        case 'I': result.i = env->GetIntField(object, field); break;
        case 'J': result.j = env->GetLongField(object, field); break;
        case 'F': result.f = env->GetFloatField(object, field); break;
        case 'D': result.d = env->GetDoubleField(object, field); break;
        default: result.l = env->GetObjectField(object, field); break;
    }
    return result;
}

NJB_API void njb_set_field(JNIEnv* env, jobject object, jfieldID field, char type, jvalue value) {
    if (!null_check(env, object)) {
        return;
    }
    switch (type) {
        case 'Z': env->SetBooleanField(object, field, (jboolean)(value.i & 1)); break;
        case 'B': env->SetByteField(object, field, (jbyte)value.i); break;
        case 'C': env->SetCharField(object, field, (jchar)value.i); break;
        case 'S': env->SetShortField(object, field, (jshort)value.i); break;
        case 'I': env->SetIntField(object, field, value.i); break;
        case 'J': env->SetLongField(object, field, value.j); break;
        case 'F': env->SetFloatField(object, field, value.f); break;
        case 'D': env->SetDoubleField(object, field, value.d); break;
        default: env->SetObjectField(object, field, value.l); break;
    }
}

NJB_API jvalue njb_get_static(JNIEnv* env, jclass clazz, jfieldID field, char type) {
    jvalue result = {};
    switch (type) {
        case 'Z': result.i = env->GetStaticBooleanField(clazz, field); break;
        case 'B': result.i = env->GetStaticByteField(clazz, field); break;
        case 'C': result.i = env->GetStaticCharField(clazz, field); break;
        case 'S': result.i = env->GetStaticShortField(clazz, field); break;
        case 'I': result.i = env->GetStaticIntField(clazz, field); break;
        case 'J': result.j = env->GetStaticLongField(clazz, field); break;
        case 'F': result.f = env->GetStaticFloatField(clazz, field); break;
        case 'D': result.d = env->GetStaticDoubleField(clazz, field); break;
        default: result.l = env->GetStaticObjectField(clazz, field); break;
    }
    return result;
}

NJB_API void njb_set_static(JNIEnv* env, jclass clazz, jfieldID field, char type, jvalue value) {
    switch (type) {
        case 'Z': env->SetStaticBooleanField(clazz, field, (jboolean)(value.i & 1)); break;
        case 'B': env->SetStaticByteField(clazz, field, (jbyte)value.i); break;
        case 'C': env->SetStaticCharField(clazz, field, (jchar)value.i); break;
        case 'S': env->SetStaticShortField(clazz, field, (jshort)value.i); break;
        case 'I': env->SetStaticIntField(clazz, field, value.i); break;
        case 'J': env->SetStaticLongField(clazz, field, value.j); break;
        case 'F': env->SetStaticFloatField(clazz, field, value.f); break;
        case 'D': env->SetStaticDoubleField(clazz, field, value.d); break;
        default: env->SetStaticObjectField(clazz, field, value.l); break;
    }
}

NJB_API void njb_throw(JNIEnv* env, jobject object) {
    if (null_check(env, object)) {
        env->Throw((jthrowable)object);
    }
}

NJB_API void njb_monitor_enter(JNIEnv* env, jobject object) {
    if (null_check(env, object)) {
        env->MonitorEnter(object);
    }
}

NJB_API void njb_monitor_exit(JNIEnv* env, jobject object) {
    if (null_check(env, object)) {
        env->MonitorExit(object);
    }
}

NJB_API jobject njb_new_array(JNIEnv* env, char type, jint length) {
    if (!length_check(env, length)) {
        return nullptr;
    }
    switch (type) {
        case 'Z': return env->NewBooleanArray(length);
        case 'B': return env->NewByteArray(length);
        case 'C': return env->NewCharArray(length);
        case 'S': return env->NewShortArray(length);
        case 'I': return env->NewIntArray(length);
        case 'J': return env->NewLongArray(length);
        case 'F': return env->NewFloatArray(length);
        default: return env->NewDoubleArray(length);
    }
}

NJB_API jobject njb_new_object_array(JNIEnv* env, jclass element, jint length) {
    if (!length_check(env, length)) {
        return nullptr;
    }
    return env->NewObjectArray(length, element, nullptr);
}

NJB_API jobject njb_new_multi_array(JNIEnv* env, jclass array_class, jint dimensions, const jint* lengths) {
    for (jint i = 0; i < dimensions; i++) {
        if (!length_check(env, lengths[i])) {
            return nullptr;
        }
    }
    jclass class_class = env->FindClass("java/lang/Class");
    jmethodID component_type = env->GetMethodID(class_class, "getComponentType", "()Ljava/lang/Class;");
    jobject element = env->NewLocalRef(array_class);
    for (jint i = 0; i < dimensions; i++) {
        jobject next = env->CallObjectMethod(element, component_type);
        env->DeleteLocalRef(element);
        element = next;
    }
    jintArray sizes = env->NewIntArray(dimensions);
    env->SetIntArrayRegion(sizes, 0, dimensions, lengths);
    jclass reflect_array = env->FindClass("java/lang/reflect/Array");
    jmethodID new_instance = env->GetStaticMethodID(reflect_array, "newInstance", "(Ljava/lang/Class;[I)Ljava/lang/Object;");
    jobject array = env->CallStaticObjectMethod(reflect_array, new_instance, element, sizes);
    env->DeleteLocalRef(reflect_array);
    env->DeleteLocalRef(sizes);
    env->DeleteLocalRef(element);
    env->DeleteLocalRef(class_class);
    return array;
}

NJB_API jint njb_array_length(JNIEnv* env, jobject array) {
    if (!null_check(env, array)) {
        return 0;
    }
    return env->GetArrayLength((jarray)array);
}

NJB_API jvalue njb_array_load(JNIEnv* env, jobject array, jint index, char type) {
    jvalue result = {};
    if (!null_check(env, array) || !index_check(env, array, index)) {
        return result;
    }
    switch (type) {
        case 'I': env->GetIntArrayRegion((jintArray)array, index, 1, &result.i); break;
        case 'J': env->GetLongArrayRegion((jlongArray)array, index, 1, &result.j); break;
        case 'F': env->GetFloatArrayRegion((jfloatArray)array, index, 1, &result.f); break;
        case 'D': env->GetDoubleArrayRegion((jdoubleArray)array, index, 1, &result.d); break;
        case 'C': {
            jchar value;
            env->GetCharArrayRegion((jcharArray)array, index, 1, &value);
            result.i = value;
            break;
        }
        case 'S': {
            jshort value;
            env->GetShortArrayRegion((jshortArray)array, index, 1, &value);
            result.i = value;
            break;
        }
        case 'B':
            if (is_boolean_array(env, array)) {
                jboolean value;
                env->GetBooleanArrayRegion((jbooleanArray)array, index, 1, &value);
                result.i = value;
            } else {
                jbyte value;
                env->GetByteArrayRegion((jbyteArray)array, index, 1, &value);
                result.i = value;
            }
            break;
        default: result.l = env->GetObjectArrayElement((jobjectArray)array, index); break;
    }
    return result;
}

NJB_API void njb_array_store(JNIEnv* env, jobject array, jint index, char type, jvalue value) {
    if (!null_check(env, array) || !index_check(env, array, index)) {
        return;
    }
    switch (type) {
        case 'I': env->SetIntArrayRegion((jintArray)array, index, 1, &value.i); break;
        case 'J': env->SetLongArrayRegion((jlongArray)array, index, 1, &value.j); break;
        case 'F': env->SetFloatArrayRegion((jfloatArray)array, index, 1, &value.f); break;
        case 'D': env->SetDoubleArrayRegion((jdoubleArray)array, index, 1, &value.d); break;
        case 'C': {
            jchar narrowed = (jchar)value.i;
            env->SetCharArrayRegion((jcharArray)array, index, 1, &narrowed);
            break;
        }
        case 'S': {
            jshort narrowed = (jshort)value.i;
            env->SetShortArrayRegion((jshortArray)array, index, 1, &narrowed);
            break;
        }
        case 'B':
            if (is_boolean_array(env, array)) {
                jboolean narrowed = (jboolean)(value.i & 1);
                env->SetBooleanArrayRegion((jbooleanArray)array, index, 1, &narrowed);
            } else {
                jbyte narrowed = (jbyte)value.i;
                env->SetByteArrayRegion((jbyteArray)array, index, 1, &narrowed);
            }
            break;
        default: env->SetObjectArrayElement((jobjectArray)array, index, value.l); break;
    }
}

NJB_API jobject njb_check_cast(JNIEnv* env, jobject object, jclass clazz) {
    if (object != nullptr && !env->IsInstanceOf(object, clazz)) {
        jclass actual = env->GetObjectClass(object);
        std::string message = "class " + class_name_of(env, actual) + " cannot be cast to class " + class_name_of(env, clazz);
        env->DeleteLocalRef(actual);
        throw_new(env, "java/lang/ClassCastException", message.c_str());
        return nullptr;
    }
    return object;
}

NJB_API jint njb_instance_of(JNIEnv* env, jobject object, jclass clazz) {
    if (object == nullptr || clazz == nullptr) {
        return 0;
    }
    return env->IsInstanceOf(object, clazz) ? 1 : 0;
}

NJB_API jint njb_same_object(JNIEnv* env, jobject a, jobject b) {
    return env->IsSameObject(a, b) ? 1 : 0;
}

NJB_API jint njb_idiv(JNIEnv* env, jint a, jint b) {
    if (b == 0) {
        throw_new(env, "java/lang/ArithmeticException", "/ by zero");
        return 0;
    }
    if (b == -1) {
        return (jint)(0u - (uint32_t)a);
    }
    return a / b;
}

NJB_API jint njb_irem(JNIEnv* env, jint a, jint b) {
    if (b == 0) {
        throw_new(env, "java/lang/ArithmeticException", "/ by zero");
        return 0;
    }
    if (b == -1) {
        return 0;
    }
    return a % b;
}

NJB_API jlong njb_ldiv(JNIEnv* env, jlong a, jlong b) {
    if (b == 0) {
        throw_new(env, "java/lang/ArithmeticException", "/ by zero");
        return 0;
    }
    if (b == -1) {
        return (jlong)(0ull - (uint64_t)a);
    }
    return a / b;
}

NJB_API jlong njb_lrem(JNIEnv* env, jlong a, jlong b) {
    if (b == 0) {
        throw_new(env, "java/lang/ArithmeticException", "/ by zero");
        return 0;
    }
    if (b == -1) {
        return 0;
    }
    return a % b;
}

NJB_API jint njb_ishl(jint value, jint count) {
    return (jint)((uint32_t)value << (count & 31));
}

NJB_API jint njb_ishr(jint value, jint count) {
    return value >> (count & 31);
}

NJB_API jint njb_iushr(jint value, jint count) {
    return (jint)((uint32_t)value >> (count & 31));
}

NJB_API jlong njb_lshl(jlong value, jint count) {
    return (jlong)((uint64_t)value << (count & 63));
}

NJB_API jlong njb_lshr(jlong value, jint count) {
    return value >> (count & 63);
}

NJB_API jlong njb_lushr(jlong value, jint count) {
    return (jlong)((uint64_t)value >> (count & 63));
}

NJB_API jint njb_f2i(jfloat value) {
    if (std::isnan(value)) {
        return 0;
    }
    if (value >= 2147483648.0f) {
        return INT32_MAX;
    }
    if (value <= -2147483648.0f) {
        return INT32_MIN;
    }
    return (jint)value;
}

NJB_API jlong njb_f2l(jfloat value) {
    if (std::isnan(value)) {
        return 0;
    }
    if (value >= 9223372036854775808.0f) {
        return INT64_MAX;
    }
    if (value <= -9223372036854775808.0f) {
        return INT64_MIN;
    }
    return (jlong)value;
}

NJB_API jint njb_d2i(jdouble value) {
    if (std::isnan(value)) {
        return 0;
    }
    if (value >= 2147483647.0) {
        return INT32_MAX;
    }
    if (value <= -2147483648.0) {
        return INT32_MIN;
    }
    return (jint)value;
}

NJB_API jlong njb_d2l(jdouble value) {
    if (std::isnan(value)) {
        return 0;
    }
    if (value >= 9223372036854775808.0) {
        return INT64_MAX;
    }
    if (value <= -9223372036854775808.0) {
        return INT64_MIN;
    }
    return (jlong)value;
}

NJB_API jint njb_lcmp(jlong a, jlong b) {
    return (a > b) - (a < b);
}

NJB_API jint njb_fcmpl(jfloat a, jfloat b) {
    if (std::isnan(a) || std::isnan(b)) {
        return -1;
    }
    return (a > b) - (a < b);
}

NJB_API jint njb_fcmpg(jfloat a, jfloat b) {
    if (std::isnan(a) || std::isnan(b)) {
        return 1;
    }
    return (a > b) - (a < b);
}

NJB_API jint njb_dcmpl(jdouble a, jdouble b) {
    if (std::isnan(a) || std::isnan(b)) {
        return -1;
    }
    return (a > b) - (a < b);
}

NJB_API jint njb_dcmpg(jdouble a, jdouble b) {
    if (std::isnan(a) || std::isnan(b)) {
        return 1;
    }
    return (a > b) - (a < b);
}

NJB_API jfloat njb_frem(jfloat a, jfloat b) {
    return std::fmod(a, b);
}

NJB_API jdouble njb_drem(jdouble a, jdouble b) {
    return std::fmod(a, b);
}
"#;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn declarations_match_arity() {
        let header = support_header();
        for op in BridgeOp::ALL {
            let prefix = format!(" {}(", op.symbol());
            let line = header
                .lines()
                .find(|line| line.starts_with("NJB_API ") && line.contains(&prefix))
                .unwrap_or_else(|| panic!("{} is not declared", op.symbol()));
            let params = &line[line.find('(').unwrap() + 1..line.rfind(')').unwrap()];
            assert_eq!(params.split(',').count(), op.arity(), "{}", line);
        }
    }

    #[test]
    fn every_declaration_is_implemented() {
        let source = support_source();
        for op in BridgeOp::ALL {
            let (ret, _) = signature(*op);
            let definition = format!("NJB_API {} {}(", ret, op.symbol());
            assert!(source.contains(&definition), "{} is not defined", op.symbol());
        }
        assert!(source.contains(&format!("#include \"{}\"", SUPPORT_HEADER_NAME)));
    }

    #[test]
    fn class_cast_failures_name_both_classes() {
        let source = support_source();
        let start = source.find("NJB_API jobject njb_check_cast(").unwrap();
        let end = start + source[start..].find("\n}\n").unwrap();
        let check_cast = &source[start..end];
        assert!(check_cast.contains("\"class \" + class_name_of(env, actual)"));
        assert!(check_cast.contains("\" cannot be cast to class \" + class_name_of(env, clazz)"));
        assert!(check_cast.contains("message.c_str()"));
        assert!(!check_cast.contains("nullptr);\n        return nullptr;"));
        assert!(source.contains("\"getName\", \"()Ljava/lang/String;\""));
    }
}

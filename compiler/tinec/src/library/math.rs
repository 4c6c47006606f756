//! The `Math` library: `Math::sin(x)`, `Math::range(x, lo, hi)`, ...
//!
//! Every function is pure, so calls with literal arguments are folded
//! at compile time when constant folding is enabled.

use tine_ir::{NativeType, TypeInfo, Value};
use tine_sema::{ConstInliner, HostLibrary, HostRegistry, NativeFn};

#[derive(Copy, Clone, Debug, Default)]
pub struct MathLibrary;

impl HostLibrary for MathLibrary {
    fn name(&self) -> &'static str {
        "Math"
    }

    fn register(&self, registry: &mut HostRegistry<'_>) {
        register_real::<f32>(registry);
        register_real::<f64>(registry);

        let int = TypeInfo::int();
        registry.pure_function("Math::abs", &[int], int, int_abs, fold_int_abs);
        registry.pure_function("Math::min", &[int, int], int, int_min, fold_int_min);
        registry.pure_function("Math::max", &[int, int], int, int_max, fold_int_max);
    }
}

// ── Floating point ──────────────────────────────────────────────────

/// `float` or `double` as seen by a native function.
trait Real: Copy {
    const TYPE: NativeType;

    fn from_value(value: Value) -> Option<Self>;
    fn wrap(self) -> Value;

    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tan(self) -> Self;
    fn abs(self) -> Self;
    fn sqrt(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn floor(self) -> Self;
    fn ceil(self) -> Self;
    fn powf(self, exp: Self) -> Self;
    fn min(self, other: Self) -> Self;
    fn max(self, other: Self) -> Self;

    /// The first `N` arguments; missing or mistyped ones read as zero.
    fn take<const N: usize>(args: &[Value]) -> [Self; N] {
        std::array::from_fn(|i| {
            args.get(i)
                .and_then(|v| v.cast(Self::TYPE))
                .and_then(Self::from_value)
                .unwrap_or_else(Self::zero)
        })
    }

    fn zero() -> Self;

    /// Folding only applies to arguments that already have the exact type.
    fn accepts(args: &[Value]) -> bool {
        args.iter().all(|a| a.native_type() == Self::TYPE)
    }
}

macro_rules! impl_real {
    ($ty:ty, $variant:ident) => {
        impl Real for $ty {
            const TYPE: NativeType = NativeType::$variant;

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn wrap(self) -> Value {
                Value::$variant(self)
            }

            fn zero() -> Self {
                0.0
            }

            fn sin(self) -> Self { <$ty>::sin(self) }
            fn cos(self) -> Self { <$ty>::cos(self) }
            fn tan(self) -> Self { <$ty>::tan(self) }
            fn abs(self) -> Self { <$ty>::abs(self) }
            fn sqrt(self) -> Self { <$ty>::sqrt(self) }
            fn exp(self) -> Self { <$ty>::exp(self) }
            fn ln(self) -> Self { <$ty>::ln(self) }
            fn floor(self) -> Self { <$ty>::floor(self) }
            fn ceil(self) -> Self { <$ty>::ceil(self) }
            fn powf(self, exp: Self) -> Self { <$ty>::powf(self, exp) }
            fn min(self, other: Self) -> Self { <$ty>::min(self, other) }
            fn max(self, other: Self) -> Self { <$ty>::max(self, other) }
        }
    };
}

impl_real!(f32, Float);
impl_real!(f64, Double);

/// One module per function, holding the native entry point and its
/// constant folder for both precisions.
macro_rules! real_functions {
    ($($name:ident / $arity:literal ($($arg:ident),+) => $body:expr;)*) => { $(
        mod $name {
            use tine_ir::Value;

            use super::Real;

            pub(super) fn call<T: Real>(args: &[Value]) -> Value {
                let [$($arg),+] = T::take::<$arity>(args);
                T::wrap($body)
            }

            pub(super) fn fold<T: Real>(args: &[Value]) -> Option<Value> {
                T::accepts(args).then(|| call::<T>(args))
            }
        }
    )* };
}

real_functions! {
    sin / 1 (x) => x.sin();
    cos / 1 (x) => x.cos();
    tan / 1 (x) => x.tan();
    abs / 1 (x) => x.abs();
    sqrt / 1 (x) => x.sqrt();
    exp / 1 (x) => x.exp();
    log / 1 (x) => x.ln();
    floor / 1 (x) => x.floor();
    ceil / 1 (x) => x.ceil();
    pow / 2 (x, y) => x.powf(y);
    min / 2 (x, y) => x.min(y);
    max / 2 (x, y) => x.max(y);
    range / 3 (x, lo, hi) => x.max(lo).min(hi);
}

type Entry = (&'static str, NativeFn, ConstInliner);

fn register_real<T: Real>(registry: &mut HostRegistry<'_>) {
    let ty = TypeInfo::native(T::TYPE);
    let unary: [Entry; 9] = [
        ("sin", sin::call::<T>, sin::fold::<T>),
        ("cos", cos::call::<T>, cos::fold::<T>),
        ("tan", tan::call::<T>, tan::fold::<T>),
        ("abs", abs::call::<T>, abs::fold::<T>),
        ("sqrt", sqrt::call::<T>, sqrt::fold::<T>),
        ("exp", exp::call::<T>, exp::fold::<T>),
        ("log", log::call::<T>, log::fold::<T>),
        ("floor", floor::call::<T>, floor::fold::<T>),
        ("ceil", ceil::call::<T>, ceil::fold::<T>),
    ];
    let binary: [Entry; 3] = [
        ("pow", pow::call::<T>, pow::fold::<T>),
        ("min", min::call::<T>, min::fold::<T>),
        ("max", max::call::<T>, max::fold::<T>),
    ];

    for (name, native, fold) in unary {
        registry.pure_function(&format!("Math::{name}"), &[ty], ty, native, fold);
    }
    for (name, native, fold) in binary {
        registry.pure_function(&format!("Math::{name}"), &[ty, ty], ty, native, fold);
    }
    registry.pure_function(
        "Math::range",
        &[ty, ty, ty],
        ty,
        range::call::<T>,
        range::fold::<T>,
    );
}

// ── Integer ─────────────────────────────────────────────────────────

fn int_arg(args: &[Value], index: usize) -> i32 {
    args.get(index).and_then(|v| v.as_i32()).unwrap_or(0)
}

fn ints(args: &[Value]) -> bool {
    args.iter().all(|a| matches!(a, Value::Int(_)))
}

fn int_abs(args: &[Value]) -> Value {
    Value::Int(int_arg(args, 0).wrapping_abs())
}

fn int_min(args: &[Value]) -> Value {
    Value::Int(int_arg(args, 0).min(int_arg(args, 1)))
}

fn int_max(args: &[Value]) -> Value {
    Value::Int(int_arg(args, 0).max(int_arg(args, 1)))
}

fn fold_int_abs(args: &[Value]) -> Option<Value> {
    ints(args).then(|| int_abs(args))
}

fn fold_int_min(args: &[Value]) -> Option<Value> {
    ints(args).then(|| int_min(args))
}

fn fold_int_max(args: &[Value]) -> Option<Value> {
    ints(args).then(|| int_max(args))
}

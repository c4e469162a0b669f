//! Type-erased function storage
//!
//! A [`TypedCallable`] owns one function of any arity (up to six arguments)
//! and can be called back in two ways:
//!
//! - [`TypedCallable::invoke`] with the concrete argument tuple and return
//!   type, checked against the signature recorded at assignment.
//! - [`TypedCallable::invoke_dynamic`] with a list of boxed values, each of
//!   which is downcast to the recorded argument type before the call.
//!
//! ```
//! use switchboard_core::{dyn_args, TypedCallable};
//!
//! let to_text = TypedCallable::from_fn(|n: i32| n.to_string());
//!
//! let text: String = to_text.invoke((42,)).unwrap();
//! assert_eq!(text, "42");
//!
//! let boxed = to_text.invoke_dynamic(dyn_args![7_i32]).unwrap();
//! assert_eq!(*boxed.downcast::<String>().unwrap(), "7");
//! ```

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Dynamically typed value passed to and returned from
/// [`TypedCallable::invoke_dynamic`]
pub type DynValue = Box<dyn Any + Send>;

/// Build a `Vec<DynValue>` from a list of expressions
#[macro_export]
macro_rules! dyn_args {
    ($($value:expr),* $(,)?) => {
        vec![$(Box::new($value) as $crate::DynValue),*]
    };
}

/// Argument and return types recorded when a function is assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub args: Vec<&'static str>,
    pub output: &'static str,
}

impl Signature {
    pub fn of<Args: ArgList, R: 'static>() -> Self {
        Self {
            args: Args::type_names(),
            output: type_name::<R>(),
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn({}) -> {}", self.args.join(", "), self.output)
    }
}

/// Tuple of owned arguments a stored function accepts
pub trait ArgList: Sized + Send + 'static {
    const ARITY: usize;

    fn type_names() -> Vec<&'static str>;

    /// Rebuild the tuple from positional dynamic values
    fn from_dynamic(args: Vec<DynValue>) -> Result<Self>;
}

/// Functions that can be stored in a [`TypedCallable`]
///
/// Implemented for every `Fn(A, B, ..) -> R + Send + Sync + 'static` up to
/// six arguments, with `Args` the argument tuple.
pub trait IntoCallable<Args, R>: Send + Sync + 'static {
    fn into_tupled(self) -> Box<dyn Fn(Args) -> R + Send + Sync>;
}

trait ErasedFn: Send + Sync {
    fn signature(&self) -> Signature;

    fn call_dynamic(&self, args: Vec<DynValue>) -> Result<DynValue>;

    fn as_any(&self) -> &dyn Any;
}

struct Tupled<Args, R> {
    func: Box<dyn Fn(Args) -> R + Send + Sync>,
}

impl<Args, R> ErasedFn for Tupled<Args, R>
where
    Args: ArgList,
    R: Send + 'static,
{
    fn signature(&self) -> Signature {
        Signature::of::<Args, R>()
    }

    fn call_dynamic(&self, args: Vec<DynValue>) -> Result<DynValue> {
        let args = Args::from_dynamic(args)?;
        Ok(Box::new((self.func)(args)))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

macro_rules! impl_arity {
    ($arity:expr; $($ty:ident $var:ident),*) => {
        impl<$($ty: Send + 'static),*> ArgList for ($($ty,)*) {
            const ARITY: usize = $arity;

            fn type_names() -> Vec<&'static str> {
                vec![$(type_name::<$ty>()),*]
            }

            #[allow(unused_mut, unused_variables)]
            fn from_dynamic(args: Vec<DynValue>) -> Result<Self> {
                let found = args.len();
                if found != Self::ARITY {
                    return Err(Error::ArityMismatch {
                        expected: Self::ARITY,
                        found,
                    });
                }

                let mut values = args.into_iter().enumerate();
                Ok(($({
                    let (index, value) = values.next().ok_or(Error::ArityMismatch {
                        expected: Self::ARITY,
                        found,
                    })?;
                    *value.downcast::<$ty>().map_err(|_| Error::ArgumentConversion {
                        index,
                        expected: type_name::<$ty>(),
                    })?
                },)*))
            }
        }

        impl<Func, R, $($ty),*> IntoCallable<($($ty,)*), R> for Func
        where
            Func: Fn($($ty),*) -> R + Send + Sync + 'static,
            $($ty: Send + 'static,)*
        {
            fn into_tupled(self) -> Box<dyn Fn(($($ty,)*)) -> R + Send + Sync> {
                Box::new(move |($($var,)*)| (self)($($var),*))
            }
        }
    };
}

impl_arity!(0;);
impl_arity!(1; A a);
impl_arity!(2; A a, B b);
impl_arity!(3; A a, B b, C c);
impl_arity!(4; A a, B b, C c, D d);
impl_arity!(5; A a, B b, C c, D d, E e);
impl_arity!(6; A a, B b, C c, D d, E e, F f);

/// Type-erased box around one function value
///
/// Cloning shares the stored function.
#[derive(Clone, Default)]
pub struct TypedCallable {
    inner: Option<Arc<dyn ErasedFn>>,
}

impl TypedCallable {
    /// An empty callable; every invocation fails with [`Error::NotAssigned`]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fn<Args, R, F>(func: F) -> Self
    where
        Args: ArgList,
        R: Send + 'static,
        F: IntoCallable<Args, R>,
    {
        let mut callable = Self::new();
        callable.assign(func);
        callable
    }

    /// Store `func`, replacing whatever was held before
    pub fn assign<Args, R, F>(&mut self, func: F)
    where
        Args: ArgList,
        R: Send + 'static,
        F: IntoCallable<Args, R>,
    {
        self.inner = Some(Arc::new(Tupled {
            func: func.into_tupled(),
        }));
    }

    pub fn is_assigned(&self) -> bool {
        self.inner.is_some()
    }

    pub fn signature(&self) -> Option<Signature> {
        self.inner.as_ref().map(|erased| erased.signature())
    }

    /// Call with statically typed arguments
    ///
    /// `Args` and `R` must be exactly the argument tuple and return type of
    /// the stored function, otherwise [`Error::TypeMismatch`] is returned.
    pub fn invoke<Args, R>(&self, args: Args) -> Result<R>
    where
        Args: ArgList,
        R: 'static,
    {
        let erased = self.inner.as_ref().ok_or(Error::NotAssigned)?;
        let typed = erased
            .as_any()
            .downcast_ref::<Tupled<Args, R>>()
            .ok_or_else(|| Error::TypeMismatch {
                expected: Signature::of::<Args, R>().to_string(),
                found: erased.signature().to_string(),
            })?;
        Ok((typed.func)(args))
    }

    /// Call with positional dynamic arguments and box the result
    pub fn invoke_dynamic(&self, args: Vec<DynValue>) -> Result<DynValue> {
        self.inner
            .as_ref()
            .ok_or(Error::NotAssigned)?
            .call_dynamic(args)
    }
}

impl fmt::Debug for TypedCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedCallable")
            .field("signature", &self.signature().map(|s| s.to_string()))
            .finish()
    }
}

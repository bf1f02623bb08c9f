//! Positional emission arguments.
//!
//! Every emission carries up to [`MAX_ARGS`] arguments, each one of a closed
//! set of kinds. Listeners read them by index through
//! [`EmissionContext::arg`](crate::EmissionContext::arg); a read never
//! consumes the value, so every listener in the chain sees the same snapshot.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::{EventError, Result};

/// Maximum number of positional arguments per emission.
pub const MAX_ARGS: usize = 7;

/// Raw key code as delivered by the terminal layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u32);

impl KeyCode {
    pub const ENTER: KeyCode = KeyCode(13);
    pub const ESCAPE: KeyCode = KeyCode(27);
    pub const BACKSPACE: KeyCode = KeyCode(127);

    /// The key as a character, if it is a valid scalar value.
    pub fn as_char(&self) -> Option<char> {
        char::from_u32(self.0)
    }
}

impl From<char> for KeyCode {
    fn from(c: char) -> Self {
        KeyCode(c as u32)
    }
}

/// Shared reference to a domain object owned outside the dispatcher
/// (a hub, a window, a transfer).
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn Any + Send + Sync>);

impl ObjectRef {
    pub fn new<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        ObjectRef(value)
    }

    /// Returns the object if it is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    /// True when both refer to the same allocation.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:p})", Arc::as_ptr(&self.0))
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A closure carried as an argument. It can be run at most once; later
/// calls to [`Task::run`] are no-ops.
#[derive(Clone)]
pub struct Task(Arc<Mutex<Option<Job>>>);

impl Task {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task(Arc::new(Mutex::new(Some(Box::new(f)))))
    }

    /// Runs the closure if it has not run yet. Returns whether it ran.
    pub fn run(&self) -> bool {
        let job = match self.0.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Whether the closure has already been taken.
    pub fn is_spent(&self) -> bool {
        match self.0.lock() {
            Ok(slot) => slot.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("spent", &self.is_spent())
            .finish()
    }
}

/// Kind tag of an [`Arg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Str,
    Key,
    Int,
    Object,
    Task,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgKind::Str => write!(f, "string"),
            ArgKind::Key => write!(f, "key"),
            ArgKind::Int => write!(f, "int"),
            ArgKind::Object => write!(f, "object"),
            ArgKind::Task => write!(f, "task"),
        }
    }
}

/// One positional argument.
#[derive(Debug, Clone)]
pub enum Arg {
    Str(String),
    Key(KeyCode),
    Int(i64),
    Object(ObjectRef),
    Task(Task),
}

impl Arg {
    pub fn kind(&self) -> ArgKind {
        match self {
            Arg::Str(_) => ArgKind::Str,
            Arg::Key(_) => ArgKind::Key,
            Arg::Int(_) => ArgKind::Int,
            Arg::Object(_) => ArgKind::Object,
            Arg::Task(_) => ArgKind::Task,
        }
    }

    /// Wraps a domain object.
    pub fn object<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Arg::Object(ObjectRef::new(value))
    }

    /// Wraps a one-shot closure.
    pub fn task<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Arg::Task(Task::new(f))
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}

impl From<&String> for Arg {
    fn from(s: &String) -> Self {
        Arg::Str(s.clone())
    }
}

impl From<KeyCode> for Arg {
    fn from(k: KeyCode) -> Self {
        Arg::Key(k)
    }
}

impl From<i64> for Arg {
    fn from(n: i64) -> Self {
        Arg::Int(n)
    }
}

impl From<i32> for Arg {
    fn from(n: i32) -> Self {
        Arg::Int(n as i64)
    }
}

impl From<u32> for Arg {
    fn from(n: u32) -> Self {
        Arg::Int(n as i64)
    }
}

impl From<ObjectRef> for Arg {
    fn from(o: ObjectRef) -> Self {
        Arg::Object(o)
    }
}

impl From<Task> for Arg {
    fn from(t: Task) -> Self {
        Arg::Task(t)
    }
}

/// Typed extraction from an [`Arg`].
pub trait FromArg<'a>: Sized {
    /// Kind this type reads.
    const KIND: ArgKind;

    fn from_arg(arg: &'a Arg) -> Option<Self>;
}

impl<'a> FromArg<'a> for &'a str {
    const KIND: ArgKind = ArgKind::Str;

    fn from_arg(arg: &'a Arg) -> Option<Self> {
        match arg {
            Arg::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl<'a> FromArg<'a> for String {
    const KIND: ArgKind = ArgKind::Str;

    fn from_arg(arg: &'a Arg) -> Option<Self> {
        match arg {
            Arg::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl<'a> FromArg<'a> for KeyCode {
    const KIND: ArgKind = ArgKind::Key;

    fn from_arg(arg: &'a Arg) -> Option<Self> {
        match arg {
            Arg::Key(k) => Some(*k),
            _ => None,
        }
    }
}

impl<'a> FromArg<'a> for i64 {
    const KIND: ArgKind = ArgKind::Int;

    fn from_arg(arg: &'a Arg) -> Option<Self> {
        match arg {
            Arg::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl<'a> FromArg<'a> for &'a ObjectRef {
    const KIND: ArgKind = ArgKind::Object;

    fn from_arg(arg: &'a Arg) -> Option<Self> {
        match arg {
            Arg::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl<'a> FromArg<'a> for &'a Task {
    const KIND: ArgKind = ArgKind::Task;

    fn from_arg(arg: &'a Arg) -> Option<Self> {
        match arg {
            Arg::Task(t) => Some(t),
            _ => None,
        }
    }
}

/// The argument snapshot of one emission.
#[derive(Debug, Clone, Default)]
pub struct Args(Vec<Arg>);

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an argument list, failing if it exceeds [`MAX_ARGS`].
    pub fn try_from_vec(args: Vec<Arg>) -> Result<Self> {
        if args.len() > MAX_ARGS {
            return Err(EventError::TooManyArgs(args.len()));
        }
        Ok(Args(args))
    }

    /// Appends one argument.
    pub fn push(&mut self, arg: impl Into<Arg>) -> Result<()> {
        if self.0.len() == MAX_ARGS {
            return Err(EventError::TooManyArgs(MAX_ARGS + 1));
        }
        self.0.push(arg.into());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Argument `index`, or `IndexOutOfRange`.
    pub fn get(&self, index: usize) -> Result<&Arg> {
        self.0.get(index).ok_or(EventError::IndexOutOfRange {
            index,
            count: self.0.len(),
        })
    }

    /// Argument `index` read as `T`.
    pub fn get_as<'a, T: FromArg<'a>>(&'a self, index: usize) -> Result<T> {
        let arg = self.get(index)?;
        T::from_arg(arg).ok_or(EventError::TypeMismatch {
            index,
            expected: T::KIND,
            found: arg.kind(),
        })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arg> {
        self.0.iter()
    }
}

/// Anything `emit` accepts as an argument list.
pub trait IntoArgs {
    fn into_args(self) -> Result<Args>;
}

impl IntoArgs for Args {
    fn into_args(self) -> Result<Args> {
        Ok(self)
    }
}

impl IntoArgs for Vec<Arg> {
    fn into_args(self) -> Result<Args> {
        Args::try_from_vec(self)
    }
}

impl<const N: usize> IntoArgs for [Arg; N] {
    fn into_args(self) -> Result<Args> {
        Args::try_from_vec(Vec::from(self))
    }
}

impl IntoArgs for Arg {
    fn into_args(self) -> Result<Args> {
        Ok(Args(vec![self]))
    }
}

impl IntoArgs for () {
    fn into_args(self) -> Result<Args> {
        Ok(Args::new())
    }
}

/// Builds a `Vec<Arg>` converting every element with `Arg::from`.
///
/// ```
/// use dcterm_events::{args, Arg};
///
/// let a: Vec<Arg> = args!["hub", 3];
/// assert_eq!(a.len(), 2);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Arg>::new()
    };
    ($($x:expr),+ $(,)?) => {
        ::std::vec![$($crate::Arg::from($x)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_typed_reads() {
        let args = args!["hello", 42, KeyCode('q' as u32)].into_args().unwrap();

        assert_eq!(args.get_as::<&str>(0).unwrap(), "hello");
        assert_eq!(args.get_as::<i64>(1).unwrap(), 42);
        assert_eq!(args.get_as::<KeyCode>(2).unwrap().as_char(), Some('q'));
    }

    #[test]
    fn test_type_mismatch() {
        let args = args![5].into_args().unwrap();
        let err = args.get_as::<String>(0).unwrap_err();
        assert_eq!(
            err,
            EventError::TypeMismatch {
                index: 0,
                expected: ArgKind::Str,
                found: ArgKind::Int,
            }
        );
    }

    #[test]
    fn test_index_out_of_range() {
        let args = args![5].into_args().unwrap();
        assert_eq!(
            args.get(1).unwrap_err(),
            EventError::IndexOutOfRange { index: 1, count: 1 }
        );
    }

    #[test]
    fn test_max_args() {
        assert!(args![1, 2, 3, 4, 5, 6, 7].into_args().is_ok());
        assert_eq!(
            args![1, 2, 3, 4, 5, 6, 7, 8].into_args().unwrap_err(),
            EventError::TooManyArgs(8)
        );

        let mut args = Args::new();
        for i in 0..MAX_ARGS {
            args.push(i as i64).unwrap();
        }
        assert!(args.push(0).is_err());
    }

    #[test]
    fn test_object_downcast() {
        struct Hub {
            name: &'static str,
        }

        let hub = Arc::new(Hub { name: "adc://hub" });
        let obj = ObjectRef::new(hub.clone());

        assert!(obj.is::<Hub>());
        assert!(!obj.is::<String>());
        assert_eq!(obj.downcast::<Hub>().unwrap().name, "adc://hub");
        assert!(obj.downcast::<String>().is_none());
        assert!(obj.ptr_eq(&obj.clone()));
    }

    #[test]
    fn test_task_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let task = Task::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let copy = task.clone();

        assert!(!task.is_spent());
        assert!(task.run());
        assert!(!copy.run());
        assert!(task.is_spent());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

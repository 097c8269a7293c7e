//! Lazy, push-driven sequences with early termination
//!
//! A [`Seq`] is a producer. Driving it with [`Seq::drive`] hands each element
//! to a consumer callback, the *sink*. The sink answers with a [`Flow`]:
//! [`Flow::Continue`] asks for the next element, [`Flow::Stop`] ends the drive.
//! The answer is checked after every element, so a sequence may be infinite as
//! long as someone eventually says stop.
//!
//! Adapters ([`Seq::map`], [`Seq::filter`], [`Seq::distinct`], ...) wrap an
//! upstream sequence and do no work until driven. When driven, they drive
//! their upstream and forward the downstream sink's answer back up, so a
//! `Stop` anywhere in a pipeline stops the source without draining it.
//!
//! Terminal operations ([`Seq::reduce`], [`Seq::find`], [`Seq::all`], ...)
//! drive the sequence internally and return a plain value.
//!
//! # Stage lifecycle
//!
//! ```text
//!   Idle ──drive──▶ Driving ──sink says Stop──▶ Suspended
//!                      │
//!                      └──upstream runs out──▶ Exhausted
//! ```
//!
//! `drive` takes `self` by value, so a stage cannot be resumed after it is
//! suspended or exhausted. Producers that implement [`Clone`] can be re-driven
//! by cloning them first. [`Seq::tracked`] exposes the current [`Stage`].
//!
//! # Memory
//!
//! Most adapters hold O(1) state. The exceptions keep a membership set:
//! [`Seq::distinct`] and [`Seq::union`] (elements seen so far),
//! [`Seq::intersection`] and [`Seq::difference`] (the whole of the second
//! sequence, collected before the first element is emitted).
//!
//! [`Seq::group_by`] is the one operation that buffers every element: group
//! membership is not known until the source ends, so the whole upstream is
//! materialized before the first group is yielded. Do not use it on infinite
//! or very large sources.
//!
//! # Example
//!
//! ```
//! use slicekit::seq::{self, Seq};
//!
//! // An infinite source, cut short by `find`
//! let first_big_square = seq::iter(1_u64..)
//!     .map(|n| n * n)
//!     .filter(|sq| sq % 7 == 0)
//!     .find(|sq| *sq > 1000);
//! assert_eq!(first_big_square, Some(1225));
//! ```

use std::cell::Cell;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::debug;

use crate::safe::{safe_execute, SafeError};
use crate::slices::Occurrences;

/// A sink's answer after receiving an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Send the next element
    Continue,
    /// Stop producing
    Stop,
}

impl Flow {
    /// True for [`Flow::Stop`]
    pub fn is_stop(self) -> bool {
        self == Flow::Stop
    }
}

/// `true` means continue
impl From<bool> for Flow {
    fn from(keep_going: bool) -> Self {
        if keep_going {
            Flow::Continue
        } else {
            Flow::Stop
        }
    }
}

/// How a drive ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    /// The producer ran out of elements
    Exhausted,
    /// The sink asked to stop
    Stopped,
}

impl Drive {
    /// True when the producer ran dry rather than being stopped
    pub fn is_exhausted(self) -> bool {
        self == Drive::Exhausted
    }
}

/// Lifecycle of a pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Constructed, not yet driven
    #[default]
    Idle,
    /// Pulling from upstream and pushing downstream
    Driving,
    /// Downstream asked to stop
    Suspended,
    /// Upstream ran out
    Exhausted,
}

/// A lazy, single-pass producer of elements
///
/// Implementors only provide [`Seq::drive`]. Everything else is built on it.
pub trait Seq: Sized {
    type Item;

    /// Push elements into `sink` until the producer runs out or `sink` returns
    /// [`Flow::Stop`]
    ///
    /// Implementations must not call `sink` again after it returned `Stop`.
    fn drive<F>(self, sink: F) -> Drive
    where
        F: FnMut(Self::Item) -> Flow;

    // ---- adapters ----

    /// Transform every element
    fn map<O, F>(self, op: F) -> Map<Self, F>
    where
        F: FnMut(Self::Item) -> O,
    {
        Map { upstream: self, op }
    }

    /// Keep only elements for which `pred` returns true
    fn filter<F>(self, pred: F) -> Filter<Self, F>
    where
        F: FnMut(&Self::Item) -> bool,
    {
        Filter {
            upstream: self,
            pred,
        }
    }

    /// Transform every element under a recovery boundary
    ///
    /// Yields `Ok` for each success. The first failure (returned error or
    /// panic) is yielded as `Err` and then the sequence stops.
    fn safe_map<O, E, F>(self, op: F) -> SafeMap<Self, F>
    where
        F: FnMut(Self::Item) -> Result<O, E>,
    {
        SafeMap { upstream: self, op }
    }

    /// Skip matches of `element`, leftmost first, as bounded by `occurrences`
    fn remove_element<O>(self, element: Self::Item, occurrences: O) -> RemoveElement<Self>
    where
        Self::Item: PartialEq,
        O: Into<Occurrences>,
    {
        RemoveElement {
            upstream: self,
            element,
            occurrences: occurrences.into(),
        }
    }

    /// Skip every element equal to one of `elements`
    fn remove_elements<I>(self, elements: I) -> RemoveElements<Self>
    where
        Self::Item: Eq + Hash,
        I: IntoIterator<Item = Self::Item>,
    {
        RemoveElements {
            upstream: self,
            doomed: elements.into_iter().collect(),
        }
    }

    /// Skip elements already seen
    fn distinct(self) -> Distinct<Self>
    where
        Self::Item: Eq + Hash + Clone,
    {
        Distinct { upstream: self }
    }

    /// Pair every element with its position
    fn enumerate(self) -> Enumerate<Self> {
        Enumerate { upstream: self }
    }

    /// At most the first `n` elements; the upstream is stopped after the n-th
    fn take(self, n: usize) -> Take<Self> {
        Take { upstream: self, n }
    }

    /// Distinct elements of `self`, then distinct new elements of `other`
    fn union<S>(self, other: S) -> Union<Self, S>
    where
        S: Seq<Item = Self::Item>,
        Self::Item: Eq + Hash + Clone,
    {
        Union {
            first: self,
            second: other,
        }
    }

    /// Elements of `other` that also appear in `self`
    ///
    /// `self` is collected into a set when the sequence is driven, so it must
    /// be finite.
    fn intersection<S>(self, other: S) -> Intersection<Self, S>
    where
        S: Seq<Item = Self::Item>,
        Self::Item: Eq + Hash,
    {
        Intersection {
            members: self,
            candidates: other,
        }
    }

    /// Elements of `self` that do not appear in `other`
    ///
    /// `other` is collected into a set when the sequence is driven, so it must
    /// be finite.
    fn difference<S>(self, other: S) -> Difference<Self, S>
    where
        S: Seq<Item = Self::Item>,
        Self::Item: Eq + Hash,
    {
        Difference {
            upstream: self,
            excluded: other,
        }
    }

    /// Partition elements by `key`, yielding `(key, group)` pairs
    ///
    /// Groups come out in order of first key appearance; each group keeps the
    /// upstream order. Unlike every other adapter, this buffers the entire
    /// upstream before yielding anything.
    fn group_by<K, F>(self, key: F) -> GroupBy<Self, F>
    where
        K: Eq + Hash + Clone,
        F: FnMut(&Self::Item) -> K,
    {
        GroupBy {
            upstream: self,
            key,
        }
    }

    /// Wrap this stage so its [`Stage`] can be observed from outside
    fn tracked(self) -> (Tracked<Self>, StageProbe) {
        let probe = StageProbe::default();
        let tracked = Tracked {
            upstream: self,
            probe: probe.clone(),
        };
        (tracked, probe)
    }

    // ---- terminals ----

    /// Run `op` on every element
    fn for_each<F>(self, mut op: F)
    where
        F: FnMut(Self::Item),
    {
        self.drive(|item| {
            op(item);
            Flow::Continue
        });
    }

    /// Drive to the end, collecting every element in order
    fn collect_vec(self) -> Vec<Self::Item> {
        let mut items = Vec::new();
        self.for_each(|item| items.push(item));
        items
    }

    /// Fold every element into an accumulator starting at `initial`
    fn reduce<O, F>(self, initial: O, mut op: F) -> O
    where
        F: FnMut(O, Self::Item) -> O,
    {
        let mut accumulator = Some(initial);
        self.drive(|item| {
            if let Some(current) = accumulator.take() {
                accumulator = Some(op(current, item));
            }
            Flow::Continue
        });
        match accumulator {
            Some(result) => result,
            // op either returned, restoring the slot, or unwound past us
            None => unreachable!("accumulator is restored after every step"),
        }
    }

    /// Like [`Seq::reduce`], stopping at the first step that errors or panics
    fn safe_reduce<O, E, F>(self, initial: O, mut op: F) -> Result<O, SafeError<E>>
    where
        F: FnMut(O, Self::Item) -> Result<O, E>,
    {
        let mut accumulator = Some(initial);
        let mut failure = None;
        self.drive(|item| {
            let Some(current) = accumulator.take() else {
                return Flow::Stop;
            };
            match safe_execute(|| op(current, item)) {
                Ok(next) => {
                    accumulator = Some(next);
                    Flow::Continue
                }
                Err(err) => {
                    failure = Some(err);
                    Flow::Stop
                }
            }
        });

        match (failure, accumulator) {
            (Some(err), _) => Err(err),
            (None, Some(result)) => Ok(result),
            (None, None) => unreachable!("accumulator is restored after every successful step"),
        }
    }

    /// The first element satisfying `pred`; the sequence stops there
    fn find<F>(self, mut pred: F) -> Option<Self::Item>
    where
        F: FnMut(&Self::Item) -> bool,
    {
        let mut found = None;
        self.drive(|item| {
            if pred(&item) {
                found = Some(item);
                Flow::Stop
            } else {
                Flow::Continue
            }
        });
        found
    }

    /// Like [`Seq::find`], but the predicate may fail or panic
    fn safe_find<E, F>(self, mut pred: F) -> Result<Option<Self::Item>, SafeError<E>>
    where
        F: FnMut(&Self::Item) -> Result<bool, E>,
    {
        let mut outcome = Ok(None);
        self.drive(|item| match safe_execute(|| pred(&item)) {
            Ok(false) => Flow::Continue,
            Ok(true) => {
                outcome = Ok(Some(item));
                Flow::Stop
            }
            Err(err) => {
                outcome = Err(err);
                Flow::Stop
            }
        });
        outcome
    }

    /// Position of the first element satisfying `pred`
    fn find_index<F>(self, mut pred: F) -> Option<usize>
    where
        F: FnMut(&Self::Item) -> bool,
    {
        let mut index = 0;
        let mut found = None;
        self.drive(|item| {
            if pred(&item) {
                found = Some(index);
                return Flow::Stop;
            }
            index += 1;
            Flow::Continue
        });
        found
    }

    /// True if some element equals `element`; stops at the first match
    fn contains(self, element: &Self::Item) -> bool
    where
        Self::Item: PartialEq,
    {
        self.any(|item| item == element)
    }

    /// True if every element satisfies `pred`; stops at the first that does not
    fn all<F>(self, mut pred: F) -> bool
    where
        F: FnMut(&Self::Item) -> bool,
    {
        let mut result = true;
        self.drive(|item| {
            if pred(&item) {
                Flow::Continue
            } else {
                result = false;
                Flow::Stop
            }
        });
        result
    }

    /// True if some element satisfies `pred`; stops at the first that does
    fn any<F>(self, mut pred: F) -> bool
    where
        F: FnMut(&Self::Item) -> bool,
    {
        let mut result = false;
        self.drive(|item| {
            if pred(&item) {
                result = true;
                Flow::Stop
            } else {
                Flow::Continue
            }
        });
        result
    }

    /// The largest element
    ///
    /// # Panics
    ///
    /// Panics if the sequence is empty.
    fn max(self) -> Self::Item
    where
        Self::Item: Ord,
    {
        self.max_with(std::cmp::max)
    }

    /// Combine elements pairwise with `op`, which returns the "larger" of two
    ///
    /// # Panics
    ///
    /// Panics if the sequence is empty.
    fn max_with<F>(self, mut op: F) -> Self::Item
    where
        F: FnMut(Self::Item, Self::Item) -> Self::Item,
    {
        let mut best = None;
        self.drive(|item| {
            best = Some(match best.take() {
                Some(current) => op(current, item),
                None => item,
            });
            Flow::Continue
        });
        match best {
            Some(best) => best,
            None => panic!("max: empty sequence"),
        }
    }

    /// True if both sequences yield equal elements in the same order and end
    /// together
    ///
    /// `self` is driven while `other` is pulled one element per push, all on
    /// the calling thread. Both sides stop as soon as the answer is known, so
    /// comparing an infinite sequence against a finite one terminates.
    ///
    /// `other` must be pullable: any [`IntoIterator`], including [`IterSeq`]
    /// and the [`Map`], [`Filter`], [`Enumerate`], [`Take`] and [`Tracked`]
    /// stages stacked on one. Generator sources built with [`from_fn`] can
    /// only be pushed, so they are compared from the `self` side.
    fn compare<I>(self, other: I) -> bool
    where
        I: IntoIterator<Item = Self::Item>,
        Self::Item: PartialEq,
    {
        let mut theirs = other.into_iter();
        let mut equal = true;
        self.drive(|ours| match theirs.next() {
            Some(next) if next == ours => Flow::Continue,
            _ => {
                equal = false;
                Flow::Stop
            }
        });
        // Ours ran out; theirs must have too
        equal && theirs.next().is_none()
    }
}

// ---- sources ----

/// A sequence backed by an iterator
#[derive(Debug, Clone)]
#[must_use = "sequences are lazy and do nothing unless driven"]
pub struct IterSeq<I> {
    inner: I,
}

/// Turn any iterable, finite or not, into a [`Seq`]
pub fn iter<I: IntoIterator>(source: I) -> IterSeq<I::IntoIter> {
    IterSeq {
        inner: source.into_iter(),
    }
}

impl<I: Iterator> Seq for IterSeq<I> {
    type Item = I::Item;

    fn drive<F>(self, mut sink: F) -> Drive
    where
        F: FnMut(Self::Item) -> Flow,
    {
        for item in self.inner {
            if sink(item).is_stop() {
                return Drive::Stopped;
            }
        }
        Drive::Exhausted
    }
}

/// The buffered group yielded by [`Seq::group_by`]
pub type VecSeq<T> = IterSeq<std::vec::IntoIter<T>>;

/// A sequence with no elements
pub fn empty<T>() -> IterSeq<std::iter::Empty<T>> {
    iter(std::iter::empty())
}

/// A sequence of exactly one element
pub fn once<T>(value: T) -> IterSeq<std::option::IntoIter<T>> {
    iter(Some(value))
}

/// An infinite sequence of `make()` results
pub fn repeat_with<T, F>(make: F) -> IterSeq<std::iter::RepeatWith<F>>
where
    F: FnMut() -> T,
{
    iter(std::iter::repeat_with(make))
}

/// A sequence produced by a generator closure
#[must_use = "sequences are lazy and do nothing unless driven"]
pub struct FromFn<G, T> {
    generator: G,
    _item: PhantomData<fn() -> T>,
}

/// Build a sequence from a closure that pushes elements into a yield callback
///
/// The generator should return once the callback answers [`Flow::Stop`]. If it
/// keeps yielding anyway, those elements are dropped before reaching the sink.
///
/// ```
/// use slicekit::seq::{self, Flow, Seq};
///
/// let evens = seq::from_fn(|emit: &mut dyn FnMut(u32) -> Flow| {
///     let mut n = 0;
///     while emit(n) == Flow::Continue {
///         n += 2;
///     }
/// });
/// assert_eq!(evens.take(3).collect_vec(), vec![0, 2, 4]);
/// ```
pub fn from_fn<T, G>(generator: G) -> FromFn<G, T>
where
    G: FnOnce(&mut dyn FnMut(T) -> Flow),
{
    FromFn {
        generator,
        _item: PhantomData,
    }
}

impl<G: Clone, T> Clone for FromFn<G, T> {
    fn clone(&self) -> Self {
        Self {
            generator: self.generator.clone(),
            _item: PhantomData,
        }
    }
}

impl<G, T> Seq for FromFn<G, T>
where
    G: FnOnce(&mut dyn FnMut(T) -> Flow),
{
    type Item = T;

    fn drive<F>(self, mut sink: F) -> Drive
    where
        F: FnMut(T) -> Flow,
    {
        let mut stopped = false;
        let mut guarded = |item: T| {
            if stopped {
                return Flow::Stop;
            }
            let flow = sink(item);
            stopped = flow.is_stop();
            flow
        };
        (self.generator)(&mut guarded);

        if stopped {
            Drive::Stopped
        } else {
            Drive::Exhausted
        }
    }
}

// ---- adapters ----

/// Lazy adapter returned by [`Seq::map`]
#[derive(Clone)]
#[must_use = "sequences are lazy and do nothing unless driven"]
pub struct Map<S, F> {
    upstream: S,
    op: F,
}

impl<S, F, O> Seq for Map<S, F>
where
    S: Seq,
    F: FnMut(S::Item) -> O,
{
    type Item = O;

    fn drive<G>(self, mut sink: G) -> Drive
    where
        G: FnMut(O) -> Flow,
    {
        let Map { upstream, mut op } = self;
        upstream.drive(|item| sink(op(item)))
    }
}

/// Returned by [`Seq::filter`]
#[derive(Clone)]
#[must_use = "sequences are lazy and do nothing unless driven"]
pub struct Filter<S, F> {
    upstream: S,
    pred: F,
}

impl<S, F> Seq for Filter<S, F>
where
    S: Seq,
    F: FnMut(&S::Item) -> bool,
{
    type Item = S::Item;

    fn drive<G>(self, mut sink: G) -> Drive
    where
        G: FnMut(S::Item) -> Flow,
    {
        let Filter { upstream, mut pred } = self;
        upstream.drive(|item| {
            if pred(&item) {
                sink(item)
            } else {
                Flow::Continue
            }
        })
    }
}

/// Returned by [`Seq::safe_map`]
#[derive(Clone)]
#[must_use = "sequences are lazy and do nothing unless driven"]
pub struct SafeMap<S, F> {
    upstream: S,
    op: F,
}

impl<S, F, O, E> Seq for SafeMap<S, F>
where
    S: Seq,
    F: FnMut(S::Item) -> Result<O, E>,
{
    type Item = Result<O, SafeError<E>>;

    fn drive<G>(self, mut sink: G) -> Drive
    where
        G: FnMut(Self::Item) -> Flow,
    {
        let SafeMap { upstream, mut op } = self;

        // Ending on our own error is not a downstream stop
        let mut downstream_stopped = false;
        upstream.drive(|item| {
            let (flow, failed) = match safe_execute(|| op(item)) {
                Ok(value) => (sink(Ok(value)), false),
                Err(err) => (sink(Err(err)), true),
            };
            downstream_stopped = flow.is_stop();
            if failed {
                Flow::Stop
            } else {
                flow
            }
        });

        if downstream_stopped {
            Drive::Stopped
        } else {
            Drive::Exhausted
        }
    }
}

/// Returned by [`Seq::remove_element`]
#[derive(Clone)]
#[must_use = "sequences are lazy and do nothing unless driven"]
pub struct RemoveElement<S: Seq> {
    upstream: S,
    element: S::Item,
    occurrences: Occurrences,
}

impl<S> Seq for RemoveElement<S>
where
    S: Seq,
    S::Item: PartialEq,
{
    type Item = S::Item;

    fn drive<G>(self, mut sink: G) -> Drive
    where
        G: FnMut(S::Item) -> Flow,
    {
        let RemoveElement {
            upstream,
            element,
            occurrences,
        } = self;
        let mut remaining = match occurrences {
            Occurrences::All => usize::MAX,
            Occurrences::First(limit) => limit,
        };
        upstream.drive(|item| {
            if remaining > 0 && item == element {
                remaining -= 1;
                return Flow::Continue;
            }
            sink(item)
        })
    }
}

/// Returned by [`Seq::remove_elements`]
#[derive(Clone)]
#[must_use = "sequences are lazy and do nothing unless driven"]
pub struct RemoveElements<S: Seq> {
    upstream: S,
    doomed: HashSet<S::Item>,
}

impl<S> Seq for RemoveElements<S>
where
    S: Seq,
    S::Item: Eq + Hash,
{
    type Item = S::Item;

    fn drive<G>(self, mut sink: G) -> Drive
    where
        G: FnMut(S::Item) -> Flow,
    {
        let RemoveElements { upstream, doomed } = self;
        upstream.drive(|item| {
            if doomed.contains(&item) {
                Flow::Continue
            } else {
                sink(item)
            }
        })
    }
}

/// Returned by [`Seq::distinct`]
#[derive(Clone)]
#[must_use = "sequences are lazy and do nothing unless driven"]
pub struct Distinct<S> {
    upstream: S,
}

impl<S> Seq for Distinct<S>
where
    S: Seq,
    S::Item: Eq + Hash + Clone,
{
    type Item = S::Item;

    fn drive<G>(self, mut sink: G) -> Drive
    where
        G: FnMut(S::Item) -> Flow,
    {
        let mut seen = HashSet::new();
        self.upstream.drive(|item| {
            if seen.insert(item.clone()) {
                sink(item)
            } else {
                Flow::Continue
            }
        })
    }
}

/// Returned by [`Seq::enumerate`]
#[derive(Clone)]
#[must_use = "sequences are lazy and do nothing unless driven"]
pub struct Enumerate<S> {
    upstream: S,
}

impl<S: Seq> Seq for Enumerate<S> {
    type Item = (usize, S::Item);

    fn drive<G>(self, mut sink: G) -> Drive
    where
        G: FnMut(Self::Item) -> Flow,
    {
        let mut index = 0;
        self.upstream.drive(|item| {
            let flow = sink((index, item));
            index += 1;
            flow
        })
    }
}

/// Returned by [`Seq::take`]
#[derive(Clone)]
#[must_use = "sequences are lazy and do nothing unless driven"]
pub struct Take<S> {
    upstream: S,
    n: usize,
}

impl<S: Seq> Seq for Take<S> {
    type Item = S::Item;

    fn drive<G>(self, mut sink: G) -> Drive
    where
        G: FnMut(S::Item) -> Flow,
    {
        let mut remaining = self.n;
        if remaining == 0 {
            return Drive::Exhausted;
        }

        // Stopping upstream ourselves is not a downstream stop
        let mut downstream_stopped = false;
        self.upstream.drive(|item| {
            remaining -= 1;
            if sink(item).is_stop() {
                downstream_stopped = true;
                return Flow::Stop;
            }
            Flow::from(remaining > 0)
        });

        if downstream_stopped {
            Drive::Stopped
        } else {
            Drive::Exhausted
        }
    }
}

/// Returned by [`Seq::union`]
#[derive(Clone)]
#[must_use = "sequences are lazy and do nothing unless driven"]
pub struct Union<A, B> {
    first: A,
    second: B,
}

impl<A, B> Seq for Union<A, B>
where
    A: Seq,
    B: Seq<Item = A::Item>,
    A::Item: Eq + Hash + Clone,
{
    type Item = A::Item;

    fn drive<G>(self, mut sink: G) -> Drive
    where
        G: FnMut(A::Item) -> Flow,
    {
        let mut seen = HashSet::new();
        let mut emit = |item: A::Item| {
            if seen.insert(item.clone()) {
                sink(item)
            } else {
                Flow::Continue
            }
        };

        match self.first.drive(&mut emit) {
            Drive::Stopped => Drive::Stopped,
            Drive::Exhausted => self.second.drive(&mut emit),
        }
    }
}

/// Returned by [`Seq::intersection`]
#[derive(Clone)]
#[must_use = "sequences are lazy and do nothing unless driven"]
pub struct Intersection<A, B> {
    members: A,
    candidates: B,
}

impl<A, B> Seq for Intersection<A, B>
where
    A: Seq,
    B: Seq<Item = A::Item>,
    A::Item: Eq + Hash,
{
    type Item = A::Item;

    fn drive<G>(self, mut sink: G) -> Drive
    where
        G: FnMut(A::Item) -> Flow,
    {
        let mut members = HashSet::new();
        self.members.for_each(|item| {
            members.insert(item);
        });

        self.candidates.drive(|item| {
            if members.contains(&item) {
                sink(item)
            } else {
                Flow::Continue
            }
        })
    }
}

/// Returned by [`Seq::difference`]
#[derive(Clone)]
#[must_use = "sequences are lazy and do nothing unless driven"]
pub struct Difference<A, B> {
    upstream: A,
    excluded: B,
}

impl<A, B> Seq for Difference<A, B>
where
    A: Seq,
    B: Seq<Item = A::Item>,
    A::Item: Eq + Hash,
{
    type Item = A::Item;

    fn drive<G>(self, mut sink: G) -> Drive
    where
        G: FnMut(A::Item) -> Flow,
    {
        let mut excluded = HashSet::new();
        self.excluded.for_each(|item| {
            excluded.insert(item);
        });

        self.upstream.drive(|item| {
            if excluded.contains(&item) {
                Flow::Continue
            } else {
                sink(item)
            }
        })
    }
}

/// Returned by [`Seq::group_by`]
#[derive(Clone)]
#[must_use = "sequences are lazy and do nothing unless driven"]
pub struct GroupBy<S, F> {
    upstream: S,
    key: F,
}

impl<S, F, K> Seq for GroupBy<S, F>
where
    S: Seq,
    F: FnMut(&S::Item) -> K,
    K: Eq + Hash + Clone,
{
    type Item = (K, VecSeq<S::Item>);

    fn drive<G>(self, mut sink: G) -> Drive
    where
        G: FnMut(Self::Item) -> Flow,
    {
        let GroupBy {
            upstream,
            key: mut key_of,
        } = self;

        let mut positions: HashMap<K, usize> = HashMap::new();
        let mut groups: Vec<(K, Vec<S::Item>)> = Vec::new();
        let mut items = 0_usize;

        upstream.for_each(|item| {
            items += 1;
            match positions.entry(key_of(&item)) {
                Entry::Occupied(slot) => groups[*slot.get()].1.push(item),
                Entry::Vacant(slot) => {
                    groups.push((slot.key().clone(), vec![item]));
                    slot.insert(groups.len() - 1);
                }
            }
        });
        debug!(items, groups = groups.len(), "group_by materialized upstream");

        for (key, members) in groups {
            if sink((key, iter(members))).is_stop() {
                return Drive::Stopped;
            }
        }
        Drive::Exhausted
    }
}

/// Shared view of a [`Tracked`] stage's lifecycle
///
/// Single-threaded: the probe and its stage are not `Send`.
#[derive(Debug, Clone, Default)]
pub struct StageProbe(Rc<Cell<Stage>>);

impl StageProbe {
    /// The stage as of the last transition
    pub fn stage(&self) -> Stage {
        self.0.get()
    }

    fn set(&self, stage: Stage) {
        self.0.set(stage);
    }
}

/// A stage that reports its lifecycle to a [`StageProbe`], from [`Seq::tracked`]
#[must_use = "sequences are lazy and do nothing unless driven"]
pub struct Tracked<S> {
    upstream: S,
    probe: StageProbe,
}

impl<S: Seq> Seq for Tracked<S> {
    type Item = S::Item;

    fn drive<G>(self, sink: G) -> Drive
    where
        G: FnMut(S::Item) -> Flow,
    {
        self.probe.set(Stage::Driving);
        let outcome = self.upstream.drive(sink);
        self.probe.set(match outcome {
            Drive::Exhausted => Stage::Exhausted,
            Drive::Stopped => Stage::Suspended,
        });
        outcome
    }
}

// ---- pulling ----
//
// Sources backed by an iterator, and the stages that map one element to at
// most one element, can also be pulled. This is what lets [`Seq::compare`]
// walk its second operand on the calling thread.

impl<I: Iterator> IntoIterator for IterSeq<I> {
    type Item = I::Item;
    type IntoIter = I;

    fn into_iter(self) -> I {
        self.inner
    }
}

impl<S, F, O> IntoIterator for Map<S, F>
where
    S: IntoIterator,
    F: FnMut(S::Item) -> O,
{
    type Item = O;
    type IntoIter = std::iter::Map<S::IntoIter, F>;

    fn into_iter(self) -> Self::IntoIter {
        self.upstream.into_iter().map(self.op)
    }
}

impl<S, F> IntoIterator for Filter<S, F>
where
    S: IntoIterator,
    F: FnMut(&S::Item) -> bool,
{
    type Item = S::Item;
    type IntoIter = std::iter::Filter<S::IntoIter, F>;

    fn into_iter(self) -> Self::IntoIter {
        self.upstream.into_iter().filter(self.pred)
    }
}

impl<S: IntoIterator> IntoIterator for Enumerate<S> {
    type Item = (usize, S::Item);
    type IntoIter = std::iter::Enumerate<S::IntoIter>;

    fn into_iter(self) -> Self::IntoIter {
        self.upstream.into_iter().enumerate()
    }
}

impl<S: IntoIterator> IntoIterator for Take<S> {
    type Item = S::Item;
    type IntoIter = std::iter::Take<S::IntoIter>;

    fn into_iter(self) -> Self::IntoIter {
        self.upstream.into_iter().take(self.n)
    }
}

/// Pulling side of a [`Tracked`] stage
///
/// Dropping it before the upstream runs out marks the stage suspended.
pub struct TrackedIter<I> {
    inner: I,
    probe: StageProbe,
    exhausted: bool,
}

impl<S: IntoIterator> IntoIterator for Tracked<S> {
    type Item = S::Item;
    type IntoIter = TrackedIter<S::IntoIter>;

    fn into_iter(self) -> Self::IntoIter {
        self.probe.set(Stage::Driving);
        TrackedIter {
            inner: self.upstream.into_iter(),
            probe: self.probe,
            exhausted: false,
        }
    }
}

impl<I: Iterator> Iterator for TrackedIter<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        if self.exhausted {
            return None;
        }
        let next = self.inner.next();
        if next.is_none() {
            self.exhausted = true;
            self.probe.set(Stage::Exhausted);
        }
        next
    }
}

impl<I> Drop for TrackedIter<I> {
    fn drop(&mut self) {
        if !self.exhausted {
            self.probe.set(Stage::Suspended);
        }
    }
}

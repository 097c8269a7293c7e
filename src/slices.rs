//! Sequential operations over slices and owned vectors
//!
//! Everything here runs on the calling thread. Operations that drop elements
//! (`filter`, `remove_element`, `remove_elements`) take the vector by value and
//! compact it in place, returning the same allocation shortened to the
//! retained elements. Surviving elements keep their relative order.
//!
//! The `safe_*` variants run the caller's function under a recovery boundary
//! (see [`crate::safe`]) once per element and stop at the first element that
//! fails, either by returning an error or by panicking.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::Hash;

use crate::safe::{safe_execute, SafeError};

/// How many matching elements [`remove_element`] should drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Occurrences {
    /// Every match
    #[default]
    All,

    /// At most this many leftmost matches; `First(0)` removes nothing
    First(usize),
}

/// Negative counts mean "all", like the `-1` sentinel callers commonly pass
impl From<isize> for Occurrences {
    fn from(count: isize) -> Self {
        if count < 0 {
            Occurrences::All
        } else {
            Occurrences::First(count.unsigned_abs())
        }
    }
}

/// `None` means "all"
impl From<Option<isize>> for Occurrences {
    fn from(count: Option<isize>) -> Self {
        count.map_or(Occurrences::All, Occurrences::from)
    }
}

/// Apply `op` to every element, collecting the results in input order
pub fn map<I, O, F>(input: &[I], op: F) -> Vec<O>
where
    F: FnMut(&I) -> O,
{
    input.iter().map(op).collect()
}

/// Like [`map`], but stops at the first element whose call errors or panics
///
/// No partial output is returned on failure.
pub fn safe_map<I, O, E, F>(input: &[I], mut op: F) -> Result<Vec<O>, SafeError<E>>
where
    F: FnMut(&I) -> Result<O, E>,
{
    let mut output = Vec::with_capacity(input.len());
    for item in input {
        output.push(safe_execute(|| op(item))?);
    }
    Ok(output)
}

/// Keep only the elements for which `keep` returns true
pub fn filter<T, F>(mut seq: Vec<T>, keep: F) -> Vec<T>
where
    F: FnMut(&T) -> bool,
{
    seq.retain(keep);
    seq
}

/// Fold `input` into a single value, starting from `initial`
pub fn reduce<I, O, F>(input: &[I], initial: O, op: F) -> O
where
    F: FnMut(O, &I) -> O,
{
    input.iter().fold(initial, op)
}

/// Like [`reduce`], but stops at the first step that errors or panics
///
/// The accumulator built so far is dropped on failure.
pub fn safe_reduce<I, O, E, F>(input: &[I], initial: O, mut op: F) -> Result<O, SafeError<E>>
where
    F: FnMut(O, &I) -> Result<O, E>,
{
    let mut accumulator = initial;
    for item in input {
        accumulator = safe_execute(|| op(accumulator, item))?;
    }
    Ok(accumulator)
}

/// The first element satisfying `pred`
///
/// Absence is `None`; there is no sentinel value to confuse with a real element.
pub fn find<T, F>(input: &[T], mut pred: F) -> Option<&T>
where
    F: FnMut(&T) -> bool,
{
    input.iter().find(|item| pred(item))
}

/// Like [`find`], but the predicate may fail or panic
pub fn safe_find<T, E, F>(input: &[T], mut pred: F) -> Result<Option<&T>, SafeError<E>>
where
    F: FnMut(&T) -> Result<bool, E>,
{
    for item in input {
        if safe_execute(|| pred(item))? {
            return Ok(Some(item));
        }
    }
    Ok(None)
}

/// Position of the first element satisfying `pred`
pub fn find_index<T, F>(input: &[T], pred: F) -> Option<usize>
where
    F: FnMut(&T) -> bool,
{
    input.iter().position(pred)
}

/// True if some element equals `element`
pub fn contains<T: PartialEq>(input: &[T], element: &T) -> bool {
    input.iter().any(|item| item == element)
}

/// True if every element satisfies `pred` (vacuously true when empty)
pub fn all<T, F>(input: &[T], pred: F) -> bool
where
    F: FnMut(&T) -> bool,
{
    input.iter().all(pred)
}

/// True if at least one element satisfies `pred`
pub fn any<T, F>(input: &[T], pred: F) -> bool
where
    F: FnMut(&T) -> bool,
{
    input.iter().any(pred)
}

/// The largest element
///
/// # Panics
///
/// Panics if `input` is empty. Wrap the call in [`crate::safe::recover`] to
/// turn that into an error.
pub fn max<T: Ord>(input: &[T]) -> &T {
    match input.iter().max() {
        Some(largest) => largest,
        None => panic!("no element provided to max"),
    }
}

fn ordering_from_less<T, F>(less: &mut F, a: &T, b: &T) -> Ordering
where
    F: FnMut(&T, &T) -> bool,
{
    if less(a, b) {
        Ordering::Less
    } else if less(b, a) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Stable in-place sort by a strict "less than" predicate
pub fn sort<T, F>(seq: &mut [T], mut less: F)
where
    F: FnMut(&T, &T) -> bool,
{
    seq.sort_by(|a, b| ordering_from_less(&mut less, a, b));
}

/// Reverse `seq` in place
pub fn reverse<T>(seq: &mut [T]) {
    seq.reverse();
}

/// Stable in-place sort by ascending weight, ties broken by `tiebreak`
pub fn weighted_sort<T, W, FW, FT>(seq: &mut [T], mut weight: FW, mut tiebreak: FT)
where
    W: Ord,
    FW: FnMut(&T) -> W,
    FT: FnMut(&T, &T) -> Ordering,
{
    seq.sort_by(|a, b| weight(a).cmp(&weight(b)).then_with(|| tiebreak(a, b)));
}

/// Remove matches of `element`, leftmost first, as bounded by `occurrences`
///
/// ```
/// use slicekit::slices::{remove_element, Occurrences};
///
/// let v = vec![1, 5, 2, 5, 3, 5];
/// assert_eq!(remove_element(v.clone(), &5, Occurrences::First(2)), vec![1, 2, 3, 5]);
/// assert_eq!(remove_element(v.clone(), &5, -1_isize), vec![1, 2, 3]);
/// assert_eq!(remove_element(v, &5, Occurrences::First(0)), vec![1, 5, 2, 5, 3, 5]);
/// ```
pub fn remove_element<T, O>(mut seq: Vec<T>, element: &T, occurrences: O) -> Vec<T>
where
    T: PartialEq,
    O: Into<Occurrences>,
{
    let mut remaining = match occurrences.into() {
        Occurrences::All => usize::MAX,
        Occurrences::First(0) => return seq,
        Occurrences::First(limit) => limit,
    };

    seq.retain(|item| {
        if remaining > 0 && item == element {
            remaining -= 1;
            false
        } else {
            true
        }
    });
    seq
}

/// Remove only the leftmost match of `element`
pub fn remove_first_occurrence<T: PartialEq>(seq: Vec<T>, element: &T) -> Vec<T> {
    remove_element(seq, element, Occurrences::First(1))
}

/// Remove every occurrence of every value in `elements`
pub fn remove_elements<T: Eq + Hash>(mut seq: Vec<T>, elements: &[T]) -> Vec<T> {
    let doomed: HashSet<&T> = elements.iter().collect();
    seq.retain(|item| !doomed.contains(item));
    seq
}

/// Split `input` into consecutive views of `size` elements
///
/// The last chunk may be shorter. A `size` of 0 or an empty input yields no
/// chunks.
pub fn chunk<T>(input: &[T], size: usize) -> Vec<&[T]> {
    if size == 0 || input.is_empty() {
        return Vec::new();
    }
    input.chunks(size).collect()
}

/// Same length and equal element-by-element
pub fn compare<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe::recover;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_map_and_filter() {
        assert_eq!(map(&[1, 2, 3], |x| x * 10), vec![10, 20, 30]);

        let evens = filter(vec![1, 2, 3, 4, 5, 6, 7, 8, 9], |x| x % 2 == 0);
        assert_eq!(evens, vec![2, 4, 6, 8]);
    }

    #[test]
    fn test_filter_reuses_allocation() {
        let mut input = Vec::with_capacity(32);
        input.extend(0..10);
        let ptr = input.as_ptr();

        let kept = filter(input, |x| *x > 6);
        assert_eq!(kept, vec![7, 8, 9]);
        assert_eq!(kept.as_ptr(), ptr);
    }

    #[test]
    fn test_safe_map_stops_at_error() {
        let mut calls = 0;
        let result = safe_map(&[1, 2, 3, 4], |x| {
            calls += 1;
            if *x == 2 {
                Err("two")
            } else {
                Ok(x * 2)
            }
        });

        assert_eq!(result, Err(SafeError::Failed("two")));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_safe_map_catches_panic() {
        let result: Result<Vec<i32>, SafeError<()>> = safe_map(&[1, 0, 3], |x| Ok(10 / x));
        assert!(result.unwrap_err().is_panic());

        let ok: Result<Vec<i32>, SafeError<()>> = safe_map(&[1, 2, 5], |x| Ok(10 / x));
        assert_eq!(ok, Ok(vec![10, 5, 2]));
    }

    #[test]
    fn test_reduce() {
        assert_eq!(reduce(&[1, 2, 3, 4], 0, |acc, x| acc + x), 10);
        assert_eq!(reduce(&["a", "b"], String::new(), |acc, s| acc + s), "ab");
    }

    #[test]
    fn test_safe_reduce() {
        let sum: Result<i32, SafeError<String>> = safe_reduce(&[1, 2, 3], 0, |acc, x| Ok(acc + x));
        assert_eq!(sum, Ok(6));

        let failed = safe_reduce(&[1, 2, 3], 0, |acc, x| {
            if *x == 3 {
                Err(format!("stopped at {}", acc))
            } else {
                Ok(acc + x)
            }
        });
        assert_eq!(failed, Err(SafeError::Failed("stopped at 3".to_string())));

        let panicked: Result<i32, SafeError<()>> =
            safe_reduce(&[1, 2], 0, |_, _| -> Result<i32, ()> { panic!("reducer") });
        assert_eq!(panicked.unwrap_err().panic().unwrap().message(), "reducer");
    }

    #[test]
    fn test_find_distinguishes_zero_value() {
        let input = [3, 0, 5];
        assert_eq!(find(&input, |x| *x == 0), Some(&0));
        assert_eq!(find(&input, |x| *x > 100), None);
        assert_eq!(find_index(&input, |x| *x == 5), Some(2));
        assert_eq!(find_index(&input, |x| *x == 7), None);
    }

    #[test]
    fn test_safe_find() {
        let input = [1, 2, 3];
        let found: Result<Option<&i32>, SafeError<()>> = safe_find(&input, |x| Ok(*x == 2));
        assert_eq!(found, Ok(Some(&2)));

        let missing: Result<Option<&i32>, SafeError<()>> = safe_find(&input, |_| Ok(false));
        assert_eq!(missing, Ok(None));

        let failed = safe_find(&input, |x| if *x == 1 { Err("bad") } else { Ok(true) });
        assert_eq!(failed, Err(SafeError::Failed("bad")));
    }

    #[test]
    fn test_predicates() {
        let input = [1, 2, 3, 4, 5, 6, 7, 8, 9];
        assert!(all(&input, |x| *x < 10));
        assert!(!all(&input, |x| *x < 5));
        assert!(any(&input, |x| *x == 5));
        assert!(!any(&input, |x| *x == 10));
        assert!(contains(&input, &9));
        assert!(!contains(&input, &0));
        assert!(all(&[] as &[i32], |_| false));
    }

    #[test]
    fn test_max() {
        assert_eq!(*max(&[3, 9, 2]), 9);

        let err = recover(|| *max::<i32>(&[])).unwrap_err();
        assert_eq!(err.message(), "no element provided to max");
    }

    #[test]
    fn test_sort_and_reverse() {
        let mut v = vec![5, 1, 4, 2, 3];
        sort(&mut v, |a, b| a < b);
        assert_eq!(v, vec![1, 2, 3, 4, 5]);

        reverse(&mut v);
        assert_eq!(v, vec![5, 4, 3, 2, 1]);

        let mut pair = vec![1, 2];
        reverse(&mut pair);
        assert_eq!(pair, vec![2, 1]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut v = vec![(1, 'a'), (0, 'b'), (1, 'c'), (0, 'd')];
        sort(&mut v, |a, b| a.0 < b.0);
        assert_eq!(v, vec![(0, 'b'), (0, 'd'), (1, 'a'), (1, 'c')]);
    }

    #[test]
    fn test_weighted_sort() {
        #[derive(Debug, PartialEq)]
        struct Item {
            id: u32,
            kind: &'static str,
        }

        let mut items: Vec<Item> = [(1, "A"), (2, "B"), (3, "A"), (4, "B"), (5, "A"), (6, "B")]
            .into_iter()
            .map(|(id, kind)| Item { id, kind })
            .collect();

        // "Heavy" sorts before "Light"
        let weight = |item: &Item| if item.kind == "A" { "Heavy" } else { "Light" };
        weighted_sort(&mut items, weight, |a, b| b.id.cmp(&a.id));

        let ids: Vec<u32> = items.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![5, 3, 1, 6, 4, 2]);
    }

    #[test]
    fn test_remove_element_limits() {
        let items = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 5, 5, 5];

        assert_eq!(
            remove_element(items.clone(), &5, Occurrences::First(2)),
            vec![1, 2, 3, 4, 6, 7, 8, 9, 10, 5, 5]
        );
        assert_eq!(
            remove_element(items.clone(), &5, -1_isize),
            vec![1, 2, 3, 4, 6, 7, 8, 9, 10]
        );
        assert_eq!(
            remove_element(items.clone(), &5, None::<isize>),
            vec![1, 2, 3, 4, 6, 7, 8, 9, 10]
        );
        assert_eq!(remove_element(items.clone(), &5, 0_isize), items);
        assert_eq!(
            remove_element(items.clone(), &5, Occurrences::First(100)),
            vec![1, 2, 3, 4, 6, 7, 8, 9, 10]
        );
        assert_eq!(remove_element(Vec::<i32>::new(), &5, Occurrences::All), Vec::<i32>::new());
    }

    #[test]
    fn test_remove_element_count_property() {
        let items = vec![5, 1, 5, 2, 5, 3, 5];
        for k in 0..6_usize {
            let result = remove_element(items.clone(), &5, Occurrences::First(k));
            let remaining = result.iter().filter(|x| **x == 5).count();
            assert_eq!(remaining, 4_usize.saturating_sub(k));

            let others: Vec<i32> = result.into_iter().filter(|x| *x != 5).collect();
            assert_eq!(others, vec![1, 2, 3]);
        }
    }

    #[test]
    fn test_remove_first_and_many() {
        assert_eq!(
            remove_first_occurrence(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10], &5),
            vec![1, 2, 3, 4, 6, 7, 8, 9, 10]
        );
        assert_eq!(
            remove_elements(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10], &[5, 4]),
            vec![1, 2, 3, 6, 7, 8, 9, 10]
        );
    }

    #[test]
    fn test_chunk() {
        let input = [1, 2, 3, 4, 5];
        let expected: Vec<&[i32]> = vec![&[1, 2][..], &[3, 4][..], &[5][..]];
        assert_eq!(chunk(&input, 2), expected);

        let whole: Vec<&[i32]> = vec![&input[..]];
        assert_eq!(chunk(&input, 10), whole);

        assert!(chunk(&input, 0).is_empty());
        assert!(chunk::<i32>(&[], 3).is_empty());
    }

    #[test]
    fn test_chunk_reconstructs_input() {
        let input: Vec<u32> = (0..97).collect();
        for size in 1..20 {
            let chunks = chunk(&input, size);
            let (last, full) = chunks.split_last().unwrap();
            assert!(full.iter().all(|c| c.len() == size));
            assert!(!last.is_empty() && last.len() <= size);
            assert_eq!(chunks.concat(), input);
        }
    }

    #[test]
    fn test_compare() {
        assert!(compare(&[1, 2, 3], &[1, 2, 3]));
        assert!(!compare(&[1, 2, 3], &[1, 2]));
        assert!(!compare(&[1, 2, 3], &[1, 2, 4]));
        assert!(compare::<u8>(&[], &[]));
    }
}

//! Deduplication and set algebra over slices
//!
//! All of these are backed by a hash membership set.
//!
//! | Operation | Output order |
//! |-----------|--------------|
//! | [`distinct`], [`unique_by_key`], [`unique_items_by_id`] | first occurrence, input order |
//! | [`difference`] | order of the first input |
//! | [`intersection`] | order of the second input |
//! | [`union`] | unspecified |

use std::collections::HashSet;
use std::hash::Hash;

/// Items that carry their own identity
///
/// Two items with the same id are duplicates for [`unique_items_by_id`], even
/// if the rest of their fields differ.
pub trait Identifiable {
    /// The identity key; equal ids mean the same item
    type Id: Eq + Hash;

    /// This item's identity
    fn id(&self) -> Self::Id;
}

/// Drop repeated values, keeping the first occurrence of each
///
/// Compacts `seq` in place. Idempotent: `distinct(distinct(x)) == distinct(x)`.
pub fn distinct<T: Eq + Hash>(mut seq: Vec<T>) -> Vec<T> {
    let keep: Vec<bool> = {
        let mut seen = HashSet::with_capacity(seq.len());
        seq.iter().map(|item| seen.insert(item)).collect()
    };
    // retain visits every element exactly once, in order
    let mut keep = keep.into_iter();
    seq.retain(|_| keep.next().unwrap_or(true));
    seq
}

/// Drop items whose extracted key was already seen, keeping the first
pub fn unique_by_key<T, K, F>(mut seq: Vec<T>, mut key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::with_capacity(seq.len());
    seq.retain(|item| seen.insert(key(item)));
    seq
}

/// Drop items whose [`Identifiable::id`] was already seen, keeping the first
pub fn unique_items_by_id<T: Identifiable>(seq: Vec<T>) -> Vec<T> {
    unique_by_key(seq, T::id)
}

/// Elements of `b` that also appear in `a`
///
/// Repeats in `b` are kept.
pub fn intersection<T: Eq + Hash + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    let members: HashSet<&T> = a.iter().collect();
    b.iter()
        .filter(|item| members.contains(item))
        .cloned()
        .collect()
}

/// Every distinct element of `a` and `b`, in no particular order
pub fn union<T: Eq + Hash + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    let members: HashSet<&T> = a.iter().chain(b).collect();
    members.into_iter().cloned().collect()
}

/// Elements of `a` that do not appear in `b`, compacted in place
pub fn difference<T: Eq + Hash>(mut a: Vec<T>, b: &[T]) -> Vec<T> {
    let excluded: HashSet<&T> = b.iter().collect();
    a.retain(|item| !excluded.contains(item));
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    struct Tagged {
        id: u32,
        tag: &'static str,
    }

    impl Identifiable for Tagged {
        type Id = u32;

        fn id(&self) -> u32 {
            self.id
        }
    }

    #[test]
    fn test_distinct() {
        let input = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 1, 2, 3];
        let once = distinct(input);
        assert_eq!(once, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(distinct(once.clone()), once);
    }

    #[test]
    fn test_distinct_keeps_first_occurrence_order() {
        let words = vec!["b", "a", "b", "c", "a"];
        assert_eq!(distinct(words), vec!["b", "a", "c"]);
        assert_eq!(distinct(Vec::<u8>::new()), Vec::<u8>::new());
    }

    #[test]
    fn test_unique_items_by_id() {
        let input: Vec<Tagged> = [1, 2, 3, 1, 2, 4]
            .into_iter()
            .enumerate()
            .map(|(pos, id)| Tagged {
                id,
                tag: if pos < 3 { "first" } else { "second" },
            })
            .collect();

        let unique = unique_items_by_id(input);
        let ids: Vec<u32> = unique.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(unique[0].tag, "first");
        assert_eq!(unique[3].tag, "second");
    }

    #[test]
    fn test_unique_by_key() {
        let words = vec!["apple", "avocado", "banana", "blueberry", "cherry"];
        let by_initial = unique_by_key(words, |w| w.chars().next());
        assert_eq!(by_initial, vec!["apple", "banana", "cherry"]);
    }

    #[test]
    fn test_difference() {
        let input: Vec<i32> = (1..=9).collect();
        assert_eq!(difference(input, &[1, 2, 3, 4, 5]), vec![6, 7, 8, 9]);
        assert_eq!(difference(vec![3, 1, 3, 2], &[]), vec![3, 1, 3, 2]);
    }

    #[test]
    fn test_intersection() {
        let common = intersection(&[1, 2, 3, 4], &[4, 9, 2, 2]);
        assert_eq!(common, vec![4, 2, 2]);
        assert!(intersection(&[1, 2], &[3]).is_empty());
    }

    #[test]
    fn test_union() {
        let mut all = union(&[1, 2, 3], &[3, 4, 5, 1]);
        all.sort_unstable();
        assert_eq!(all, vec![1, 2, 3, 4, 5]);
    }
}

//! Two-tier cache that deduplicates the short, highly repetitive strings the
//! lexer produces.
//!
//! A lookup first probes a small direct-mapped table local to the calling
//! thread, then a shared table probed quadratically inside a fixed-size
//! bucket. Each shared slot is its own mutex, taken only with a non-blocking
//! `try_lock`. This is not lock-free: a held slot is skipped as a miss, and a
//! write that finds its slot held is dropped. Interning never waits, and since
//! the table is a cache rather than a registry a miss only costs an allocation.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;

const LOCAL_SIZE: usize = 256;
const SHARED_SIZE: usize = 4096;
const BUCKET_SIZE: usize = 8;
const MAX_CACHED_LEN: usize = 128;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a.
pub const fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash = (hash ^ bytes[i] as u32).wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// FNV-1a over the UTF-8 encoding of `chars`, equal to `fnv1a` of the
/// collected string.
fn fnv1a_chars(chars: &[char]) -> u32 {
    let mut buf = [0; 4];
    chars.iter().fold(FNV_OFFSET_BASIS, |hash, ch| {
        ch.encode_utf8(&mut buf)
            .bytes()
            .fold(hash, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME))
    })
}

#[derive(Clone)]
struct Entry {
    hash: u32,
    text: Arc<str>,
}

thread_local! {
    // Strings are values, so one local tier can front every table instance.
    static LOCAL: RefCell<Vec<Option<Entry>>> = RefCell::new(vec![None; LOCAL_SIZE]);
}

pub struct StringInternTable {
    slots: Box<[Mutex<Option<Entry>>]>,
    mask: usize,
    victim: AtomicU32,
}

impl Default for StringInternTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StringInternTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StringInternTable").field("capacity", &self.slots.len()).finish()
    }
}

impl StringInternTable {
    pub fn new() -> Self {
        Self::with_capacity(SHARED_SIZE)
    }

    /// Creates a table with at least `capacity` shared slots, rounded up to a
    /// power of two no smaller than one bucket.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(BUCKET_SIZE).next_power_of_two();
        Self {
            slots: (0..capacity).map(|_| Mutex::new(None)).collect(),
            mask: capacity - 1,
            victim: AtomicU32::new(0x9e37_79b9),
        }
    }

    /// The process-wide table used when building syntax trees.
    pub fn shared() -> &'static Self {
        static SHARED: LazyLock<StringInternTable> = LazyLock::new(StringInternTable::new);
        &SHARED
    }

    pub fn add(&self, text: &str) -> Arc<str> {
        if text.len() > MAX_CACHED_LEN {
            return Arc::from(text);
        }
        self.lookup(fnv1a(text.as_bytes()), |cached| cached == text, || Arc::from(text))
    }

    pub fn add_chars(&self, chars: &[char]) -> Arc<str> {
        if chars.len() > MAX_CACHED_LEN {
            return chars.iter().collect::<String>().into();
        }
        self.lookup(
            fnv1a_chars(chars),
            |cached| cached.chars().eq(chars.iter().copied()),
            || chars.iter().collect::<String>().into(),
        )
    }

    /// Interns the contents of `buffer` and clears it for reuse.
    pub fn add_buffer(&self, buffer: &mut String) -> Arc<str> {
        let text = self.add(buffer);
        buffer.clear();
        text
    }

    fn lookup(
        &self,
        hash: u32,
        eq: impl Fn(&str) -> bool,
        make: impl FnOnce() -> Arc<str>,
    ) -> Arc<str> {
        if let Some(text) = local_get(hash, &eq) {
            return text;
        }

        let text = self.shared_get_or_insert(hash, &eq, make);
        local_put(hash, &text);
        text
    }

    fn probe(&self, hash: u32, attempt: usize) -> usize {
        (hash as usize).wrapping_add(attempt * (attempt + 1) / 2) & self.mask
    }

    fn shared_get_or_insert(
        &self,
        hash: u32,
        eq: &impl Fn(&str) -> bool,
        make: impl FnOnce() -> Arc<str>,
    ) -> Arc<str> {
        let mut empty = None;

        for attempt in 0..BUCKET_SIZE {
            let index = self.probe(hash, attempt);
            let Some(slot) = self.slots[index].try_lock() else { continue };
            match &*slot {
                Some(entry) if entry.hash == hash && eq(&*entry.text) => {
                    return Arc::clone(&entry.text);
                }
                Some(_) => {}
                None => {
                    empty.get_or_insert(index);
                }
            }
        }

        let text = make();
        let index = empty.unwrap_or_else(|| self.probe(hash, self.next_victim()));
        if let Some(mut slot) = self.slots[index].try_lock() {
            *slot = Some(Entry { hash, text: Arc::clone(&text) });
        }
        text
    }

    fn next_victim(&self) -> usize {
        let state = self.victim.fetch_add(0x9e37_79b9, Ordering::Relaxed);
        let mixed = (state ^ (state >> 15)).wrapping_mul(0x2c1b_3c6d);
        (mixed >> 16) as usize % BUCKET_SIZE
    }
}

fn local_get(hash: u32, eq: &impl Fn(&str) -> bool) -> Option<Arc<str>> {
    LOCAL.with(|local| match &local.borrow()[hash as usize % LOCAL_SIZE] {
        Some(entry) if entry.hash == hash && eq(&*entry.text) => Some(Arc::clone(&entry.text)),
        _ => None,
    })
}

fn local_put(hash: u32, text: &Arc<str>) {
    LOCAL.with(|local| {
        local.borrow_mut()[hash as usize % LOCAL_SIZE] = Some(Entry { hash, text: Arc::clone(text) });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), 0x811c_9dc5);
        assert_eq!(fnv1a(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a(b"foobar"), 0xbf9c_f968);
        assert_eq!(fnv1a_chars(&['f', 'o', 'o', 'b', 'a', 'r']), fnv1a(b"foobar"));
        assert_eq!(fnv1a_chars(&['é', '!']), fnv1a("é!".as_bytes()));
    }

    #[test]
    fn repeated_strings_share_storage() {
        let table = StringInternTable::new();

        let first = table.add("class");
        let second = table.add("class");
        assert_eq!(&*first, "class");
        assert!(Arc::ptr_eq(&first, &second));

        let other = table.add("style");
        assert_eq!(&*other, "style");
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn chars_and_buffers_resolve_to_the_same_string() {
        let table = StringInternTable::new();

        let text = table.add("div");
        let from_chars = table.add_chars(&['d', 'i', 'v']);
        assert!(Arc::ptr_eq(&text, &from_chars));

        let mut buffer = String::from("div");
        let from_buffer = table.add_buffer(&mut buffer);
        assert!(buffer.is_empty());
        assert!(Arc::ptr_eq(&text, &from_buffer));
    }

    #[test]
    fn long_strings_bypass_the_cache() {
        let table = StringInternTable::new();
        let long = "x".repeat(MAX_CACHED_LEN + 1);

        let first = table.add(&long);
        let second = table.add(&long);
        assert_eq!(first, second);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn eviction_keeps_results_correct() {
        let table = StringInternTable::with_capacity(1);
        let words = (0..200).map(|i| format!("word{i}")).collect::<Vec<_>>();

        for _ in 0..3 {
            for word in &words {
                assert_eq!(&*table.add(word), word.as_str());
            }
        }
    }

    #[test]
    fn held_slots_are_skipped() {
        let table = StringInternTable::with_capacity(BUCKET_SIZE);
        let guards = table.slots.iter().map(|slot| slot.lock()).collect::<Vec<_>>();

        assert_eq!(&*table.add("held"), "held");
        drop(guards);
        assert!(table.slots.iter().all(|slot| slot.lock().is_none()));
    }

    #[test]
    fn concurrent_interning_returns_equal_strings() {
        let table = StringInternTable::with_capacity(64);
        let words = ["a", "b", "span", "div", "class", "id", "href", "style"];

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        for word in words {
                            assert_eq!(&*table.add(word), word);
                        }
                    }
                });
            }
        });
    }
}

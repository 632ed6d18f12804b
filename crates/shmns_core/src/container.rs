//! Process-local handles to shared namespaces.
//!
//! A namespace is made of three kinds of OS objects, all found by name:
//!
//! ```text
//! <ns>             directory segment (header + fixed slot table)
//! <ns>|            lock
//! <ns>|<entry>     one value segment per entry, sized to the value
//! ```
//!
//! The first [`Container::open`] creates them; the last [`Container::close`]
//! destroys them. In between, every operation takes the namespace lock once,
//! re-reads the directory under it, and finishes before releasing it.

use crate::config::Config;
use crate::directory::{directory_size, CloseOutcome, Directory, HEADER_SIZE};
use crate::error::{CoreError, CoreResult};
use crate::name::NamespaceName;
use parking_lot::Mutex;
use shmns_storage::{CrossProcessLock, Segment, SegmentName};
use tracing::{debug, trace, warn};

/// A snapshot of a namespace's directory header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    /// The namespace name.
    pub name: String,
    /// Occupied entries.
    pub size: usize,
    /// Fixed maximum number of entries.
    pub capacity: usize,
    /// Handles attached across all processes.
    pub refcount: i64,
}

/// The OS handles owned by an open container.
#[derive(Debug)]
struct Attached {
    lock: CrossProcessLock,
    directory: Segment,
}

/// A handle to a shared, fixed-capacity key/value namespace.
///
/// Any number of containers, in any number of processes, may be open on the
/// same namespace name at once; they all see the same entries. The namespace
/// lives until the last of them closes.
///
/// # Thread Safety
///
/// A container is `Send + Sync`. Calls from threads of one process are
/// serialized by an in-process mutex before the cross-process lock is taken,
/// because the lock does not exclude a handle from itself.
///
/// # Failure Modes
///
/// Writes to the directory are plain memory writes. A process that dies in
/// the middle of an operation releases the lock (the OS drops it) but may
/// leave that one operation half-applied.
///
/// # Example
///
/// ```no_run
/// use shmns_core::Container;
///
/// let ns = Container::open("settings", 16)?;
/// ns.set("theme", b"dark")?;
/// assert_eq!(ns.get("theme")?, Some(b"dark".to_vec()));
/// ns.close()?;
/// # Ok::<(), shmns_core::CoreError>(())
/// ```
#[derive(Debug)]
pub struct Container {
    name: NamespaceName,
    config: Config,
    state: Mutex<Option<Attached>>,
}

impl Container {
    /// Opens the namespace `name` with the default [`Config`].
    ///
    /// See [`Container::open_with_config`].
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the directory segment or
    /// lock cannot be created.
    pub fn open(name: &str, capacity: usize) -> CoreResult<Self> {
        Self::open_with_config(name, capacity, Config::default())
    }

    /// Opens the namespace `name`, creating it if no process has it open.
    ///
    /// `capacity` is the maximum number of entries. It is only used by the
    /// opener that creates the namespace; everyone attaching later gets the
    /// capacity the creator chose.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name is invalid or `capacity` overflows the directory size
    /// - The directory segment or the lock cannot be created (`Storage`)
    /// - An existing directory segment does not hold a namespace table
    ///
    /// If this call was creating the namespace, nothing it created outlives
    /// the failure.
    pub fn open_with_config(name: &str, capacity: usize, config: Config) -> CoreResult<Self> {
        let name = NamespaceName::new(name)?;
        let size = directory_size(capacity).ok_or_else(|| {
            CoreError::invalid_argument(format!("capacity {capacity} is too large"))
        })?;
        let attempts = config.open_attempts.max(1);

        for attempt in 1..=attempts {
            let lock = CrossProcessLock::create(&name.lock_name()?)?;

            let Some(directory) = attach(&name, &lock, capacity, size)? else {
                debug!(namespace = %name, attempt, "lock retired by a closing handle, retrying");
                lock.destroy(false)?;
                continue;
            };

            return Ok(Self {
                name,
                config,
                state: Mutex::new(Some(Attached { lock, directory })),
            });
        }

        Err(CoreError::StaleLock {
            name: name.as_str().to_string(),
            attempts,
        })
    }

    /// Returns the namespace name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the configuration this container was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Appends a new entry without looking for an existing one.
    ///
    /// Returns `Ok(false)` if the namespace is full. If `name` already
    /// exists a second slot with the same name is created; both share one
    /// value segment and read back the new value. Use [`Container::set`] to
    /// insert-or-update.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the value segment cannot be
    /// written.
    pub fn add(&self, name: &str, value: &[u8]) -> CoreResult<bool> {
        let value_name = self.name.value_segment_name(name)?;

        self.with_directory(|directory| {
            if directory.is_full() {
                debug!(namespace = %self.name, entry = name, "namespace full");
                return Ok(false);
            }

            write_value(&value_name, value)?;
            directory.update_value_len(name, value.len());
            let added = directory.push(name, value.len())?;
            trace!(namespace = %self.name, entry = name, len = value.len(), "added");
            Ok(added)
        })
    }

    /// Stores `value` under `name`, replacing any existing value.
    ///
    /// Updating an existing entry leaves [`Container::size`] unchanged.
    /// Returns `Ok(false)` if `name` is new and the namespace is full.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the value segment cannot be
    /// written.
    pub fn set(&self, name: &str, value: &[u8]) -> CoreResult<bool> {
        let value_name = self.name.value_segment_name(name)?;

        self.with_directory(|directory| {
            // Looked up under the lock: an index found earlier may have been
            // removed by another process since.
            if directory.find(name).is_some() {
                write_value(&value_name, value)?;
                directory.update_value_len(name, value.len());
                trace!(namespace = %self.name, entry = name, len = value.len(), "updated");
                return Ok(true);
            }

            if directory.is_full() {
                debug!(namespace = %self.name, entry = name, "namespace full");
                return Ok(false);
            }

            write_value(&value_name, value)?;
            let inserted = directory.push(name, value.len())?;
            trace!(namespace = %self.name, entry = name, len = value.len(), "inserted");
            Ok(inserted)
        })
    }

    /// Returns a copy of the value stored under `name`, or `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid, or the entry exists but its
    /// value segment is missing or shorter than recorded.
    pub fn get(&self, name: &str) -> CoreResult<Option<Vec<u8>>> {
        let value_name = self.name.value_segment_name(name)?;

        self.with_directory(|directory| {
            let Some(index) = directory.find(name) else {
                return Ok(None);
            };
            let len = directory.value_len(index);

            let segment = Segment::attach(&value_name)?.ok_or_else(|| CoreError::MissingValue {
                entry: name.to_string(),
            })?;

            if segment.len() < len {
                let held = segment.len();
                segment.close(false)?;
                return Err(CoreError::invalid_format(format!(
                    "value segment for `{name}` holds {held} bytes, directory records {len}"
                )));
            }

            let value = segment.as_slice()[..len].to_vec();
            segment.close(false)?;
            Ok(Some(value))
        })
    }

    /// Returns whether an entry named `name` exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the lock cannot be taken.
    pub fn contains(&self, name: &str) -> CoreResult<bool> {
        crate::name::validate_entry_name(name)?;
        self.with_directory(|directory| Ok(directory.find(name).is_some()))
    }

    /// Removes the entry `name` and destroys its value segment.
    ///
    /// Entries after it move down one slot and stay readable by name.
    /// Returns `false` if there was no such entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the value segment cannot be
    /// destroyed; the entry stays listed and readable in that case.
    pub fn remove(&self, name: &str) -> CoreResult<bool> {
        let value_name = self.name.value_segment_name(name)?;

        self.with_directory(|directory| {
            let Some(index) = directory.find(name) else {
                return Ok(false);
            };

            // A duplicate left behind by `add` still needs the segment.
            if directory.count(name) == 1 {
                Segment::unlink(&value_name)?;
            }
            directory.remove_at(index);
            trace!(namespace = %self.name, entry = name, "removed");
            Ok(true)
        })
    }

    /// Removes every entry and destroys every value segment.
    ///
    /// The capacity is unchanged.
    ///
    /// # Errors
    ///
    /// Returns the first error if some value segments cannot be destroyed.
    /// Every other segment is still destroyed and its entry removed; the
    /// entries whose segments survive stay listed and readable.
    pub fn clear(&self) -> CoreResult<()> {
        self.with_directory(|directory| {
            destroy_entries(&self.name, directory)?;
            trace!(namespace = %self.name, "cleared");
            Ok(())
        })
    }

    /// Returns the number of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be taken.
    pub fn size(&self) -> CoreResult<usize> {
        self.with_directory(|directory| Ok(directory.size()))
    }

    /// Returns the maximum number of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be taken.
    pub fn capacity(&self) -> CoreResult<usize> {
        self.with_directory(|directory| Ok(directory.capacity()))
    }

    /// Returns the entry names in slot order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be taken.
    pub fn names(&self) -> CoreResult<Vec<String>> {
        self.with_directory(|directory| Ok(directory.names()))
    }

    /// Returns a consistent snapshot of the directory header.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be taken.
    pub fn info(&self) -> CoreResult<NamespaceInfo> {
        self.with_directory(|directory| {
            Ok(NamespaceInfo {
                name: self.name.as_str().to_string(),
                size: directory.size(),
                capacity: directory.capacity(),
                refcount: directory.refcount(),
            })
        })
    }

    /// Detaches from the namespace.
    ///
    /// If this was the last attached handle in any process, every value
    /// segment, the directory segment and the lock's name are destroyed and
    /// the next open starts from an empty namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be taken or a shared object cannot
    /// be destroyed.
    pub fn close(self) -> CoreResult<CloseOutcome> {
        let attached = self.state.lock().take();
        match attached {
            Some(attached) => detach(&self.name, attached),
            None => Err(CoreError::Closed),
        }
    }

    fn with_directory<T>(
        &self,
        op: impl FnOnce(&mut Directory<'_>) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mut state = self.state.lock();
        let attached = state.as_mut().ok_or(CoreError::Closed)?;

        let guard = attached.lock.lock()?;
        let result = Directory::open(attached.directory.as_mut_slice())
            .and_then(|mut directory| op(&mut directory));
        guard.unlock()?;

        result
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if let Some(attached) = self.state.get_mut().take() {
            if let Err(err) = detach(&self.name, attached) {
                warn!(namespace = %self.name, error = %err, "failed to close namespace on drop");
            }
        }
    }
}

/// Takes the lock and attaches to (or creates) the directory.
///
/// Returns `Ok(None)` if the lock turned out to be retired.
fn attach(
    name: &NamespaceName,
    lock: &CrossProcessLock,
    capacity: usize,
    size: usize,
) -> CoreResult<Option<Segment>> {
    let guard = lock.lock()?;
    if !lock.is_current()? {
        return Ok(None);
    }

    if let Some(mut segment) = Segment::attach(name.segment_name())? {
        let live = segment.len() >= HEADER_SIZE
            && Directory::raw(segment.as_mut_slice())?.refcount() > 0;

        if live {
            let mut directory = Directory::open(segment.as_mut_slice())?;
            let refcount = directory.attach();
            debug!(
                namespace = %name,
                capacity = directory.capacity(),
                refcount,
                "attached to namespace"
            );
            guard.unlock()?;
            return Ok(Some(segment));
        }

        purge_detached(name, &mut segment)?;
        segment.close(false)?;
    }

    // Nobody is attached from here on, so a failure may remove everything.
    match create(name, capacity, size) {
        Ok(segment) => {
            debug!(namespace = %name, capacity, "created namespace");
            guard.unlock()?;
            Ok(Some(segment))
        }
        Err(err) => {
            Segment::unlink(name.segment_name())?;
            lock.unregister_name()?;
            debug!(namespace = %name, error = %err, "failed to create namespace");
            Err(err)
        }
    }
}

/// Sizes the directory segment under the lock, so concurrent first openers
/// cannot race on it, and writes an empty table.
fn create(name: &NamespaceName, capacity: usize, size: usize) -> CoreResult<Segment> {
    let mut segment = Segment::open_exact(name.segment_name(), size)?;
    Directory::raw(segment.as_mut_slice())?.initialize(capacity)?;
    Ok(segment)
}

/// Destroys the value segments still listed by a table nobody is attached
/// to, before that table is overwritten.
fn purge_detached(name: &NamespaceName, segment: &mut Segment) -> CoreResult<()> {
    if segment.len() < HEADER_SIZE {
        return Ok(());
    }
    // Memory that never held a table lists nothing.
    let Ok(mut directory) = Directory::open_detached(segment.as_mut_slice()) else {
        return Ok(());
    };
    if directory.size() > 0 {
        debug!(namespace = %name, entries = directory.size(), "purging detached table");
    }
    destroy_entries(name, &mut directory)
}

/// Drops one reference and tears the namespace down if it was the last.
///
/// If a value segment cannot be destroyed the teardown stops there: the
/// directory keeps listing the survivors with no handle attached, and the
/// next open purges them.
fn detach(name: &NamespaceName, attached: Attached) -> CoreResult<CloseOutcome> {
    let Attached {
        lock,
        mut directory,
    } = attached;
    let guard = lock.lock()?;

    let outcome = {
        let mut table = Directory::open(directory.as_mut_slice())?;
        let outcome = table.detach();
        if outcome == CloseOutcome::LastClosed {
            destroy_entries(name, &mut table)?;
        }
        outcome
    };

    match outcome {
        CloseOutcome::LastClosed => {
            directory.close(true)?;
            // Retired while still held, so nobody can win it afterwards and
            // believe it guards a live namespace.
            lock.unregister_name()?;
            guard.unlock()?;
            lock.destroy(false)?;
            debug!(namespace = %name, "last handle closed, namespace destroyed");
        }
        CloseOutcome::StillAttached { remaining } => {
            directory.close(false)?;
            guard.unlock()?;
            lock.destroy(false)?;
            debug!(namespace = %name, remaining, "detached from namespace");
        }
    }

    Ok(outcome)
}

/// Destroys every value segment and removes each entry whose segment is
/// gone.
///
/// Every segment is attempted. Entries whose segment could not be destroyed
/// stay in the table and the first such error is returned.
fn destroy_entries(name: &NamespaceName, directory: &mut Directory<'_>) -> CoreResult<()> {
    let mut first_error = None;
    let mut index = 0;

    while index < directory.size() {
        let entry = directory.name_at(index);
        match Segment::unlink(&name.value_segment_name(&entry)?) {
            Ok(_) => directory.remove_at(index),
            Err(err) => {
                warn!(namespace = %name, entry = %entry, error = %err, "value segment survived");
                first_error.get_or_insert(err);
                index += 1;
            }
        }
    }

    match first_error {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn write_value(name: &SegmentName, value: &[u8]) -> CoreResult<()> {
    let mut segment = Segment::open_exact(name, value.len())?;
    segment.as_mut_slice().copy_from_slice(value);
    segment.close(false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    struct Fixture {
        name: String,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                name: format!("shmns-core-{}", uuid::Uuid::new_v4().simple()),
                config: Config::new(),
            }
        }

        fn open(&self, capacity: usize) -> Container {
            Container::open_with_config(&self.name, capacity, self.config.clone()).unwrap()
        }

        fn namespace(&self) -> NamespaceName {
            NamespaceName::new(&self.name).unwrap()
        }

        fn directory_exists(&self) -> bool {
            exists(self.namespace().segment_name())
        }

        fn lock_exists(&self) -> bool {
            exists(&self.namespace().lock_name().unwrap())
        }

        fn value_exists(&self, entry: &str) -> bool {
            exists(&self.namespace().value_segment_name(entry).unwrap())
        }

        /// Holds the namespace lock the way another process would.
        fn outside_lock(&self) -> CrossProcessLock {
            CrossProcessLock::create(&self.namespace().lock_name().unwrap()).unwrap()
        }
    }

    fn exists(name: &SegmentName) -> bool {
        match Segment::attach(name).unwrap() {
            Some(segment) => {
                segment.close(false).unwrap();
                true
            }
            None => false,
        }
    }

    #[test]
    fn scenario_from_open_to_remove() {
        let fixture = Fixture::new();
        let ns = fixture.open(4);

        assert!(ns.set("a", b"1").unwrap());
        assert!(ns.set("b", b"22").unwrap());
        assert_eq!(ns.size().unwrap(), 2);
        assert_eq!(ns.get("a").unwrap(), Some(b"1".to_vec()));

        assert!(ns.remove("a").unwrap());
        assert_eq!(ns.size().unwrap(), 1);
        assert_eq!(ns.get("a").unwrap(), None);
        assert_eq!(ns.get("b").unwrap(), Some(b"22".to_vec()));

        assert_eq!(ns.close().unwrap(), CloseOutcome::LastClosed);
    }

    #[test]
    fn set_existing_key_is_an_update() {
        let fixture = Fixture::new();
        let ns = fixture.open(2);

        ns.set("k", b"short").unwrap();
        ns.set("k", b"a much longer value").unwrap();
        assert_eq!(ns.size().unwrap(), 1);
        assert_eq!(ns.get("k").unwrap(), Some(b"a much longer value".to_vec()));

        ns.set("k", b"x").unwrap();
        assert_eq!(ns.get("k").unwrap(), Some(b"x".to_vec()));
    }

    #[test]
    fn set_existing_key_succeeds_when_full() {
        let fixture = Fixture::new();
        let ns = fixture.open(1);

        assert!(ns.set("k", b"1").unwrap());
        assert!(!ns.set("other", b"2").unwrap());
        assert!(ns.set("k", b"3").unwrap());
        assert_eq!(ns.get("k").unwrap(), Some(b"3".to_vec()));
    }

    #[test]
    fn add_beyond_capacity_fails_without_change() {
        let fixture = Fixture::new();
        let ns = fixture.open(2);

        assert!(ns.add("a", b"1").unwrap());
        assert!(ns.add("b", b"2").unwrap());
        assert!(!ns.add("c", b"3").unwrap());

        assert_eq!(ns.size().unwrap(), 2);
        assert_eq!(ns.get("c").unwrap(), None);
        assert_eq!(ns.capacity().unwrap(), 2);
    }

    #[test]
    fn add_duplicates_share_latest_value() {
        let fixture = Fixture::new();
        let ns = fixture.open(4);

        ns.add("k", b"first").unwrap();
        ns.add("k", b"second!").unwrap();
        assert_eq!(ns.size().unwrap(), 2);
        assert_eq!(ns.get("k").unwrap(), Some(b"second!".to_vec()));

        // The value survives until the last slot with that name goes.
        ns.remove("k").unwrap();
        assert_eq!(ns.get("k").unwrap(), Some(b"second!".to_vec()));
        ns.remove("k").unwrap();
        assert_eq!(ns.get("k").unwrap(), None);
    }

    #[test]
    fn empty_values_round_trip() {
        let fixture = Fixture::new();
        let ns = fixture.open(1);

        ns.set("empty", b"").unwrap();
        assert_eq!(ns.get("empty").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn remove_missing_is_a_no_op() {
        let fixture = Fixture::new();
        let ns = fixture.open(2);
        ns.set("a", b"1").unwrap();

        assert!(!ns.remove("missing").unwrap());
        assert_eq!(ns.size().unwrap(), 1);
    }

    #[test]
    fn clear_removes_everything_but_capacity() {
        let fixture = Fixture::new();
        let ns = fixture.open(3);
        ns.set("a", b"1").unwrap();
        ns.set("b", b"2").unwrap();

        ns.clear().unwrap();

        assert_eq!(ns.size().unwrap(), 0);
        assert_eq!(ns.capacity().unwrap(), 3);
        assert_eq!(ns.get("a").unwrap(), None);
        assert_eq!(ns.get("b").unwrap(), None);
        assert!(ns.set("c", b"3").unwrap());
    }

    #[test]
    fn names_and_contains() {
        let fixture = Fixture::new();
        let ns = fixture.open(3);
        ns.set("x", b"1").unwrap();
        ns.set("y", b"2").unwrap();

        assert_eq!(ns.names().unwrap(), vec!["x", "y"]);
        assert!(ns.contains("x").unwrap());
        assert!(!ns.contains("z").unwrap());
    }

    #[test]
    fn second_handle_attaches() {
        let fixture = Fixture::new();
        let a = fixture.open(4);
        let b = fixture.open(100);

        // Capacity is fixed by the creator.
        assert_eq!(b.capacity().unwrap(), 4);
        assert_eq!(a.info().unwrap().refcount, 2);

        a.set("k", b"v").unwrap();
        assert_eq!(b.get("k").unwrap(), Some(b"v".to_vec()));

        assert_eq!(
            a.close().unwrap(),
            CloseOutcome::StillAttached { remaining: 1 }
        );
        assert_eq!(b.get("k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(b.close().unwrap(), CloseOutcome::LastClosed);
    }

    #[test]
    fn last_close_destroys_namespace() {
        let fixture = Fixture::new();
        let ns = fixture.open(2);
        ns.set("k", b"v").unwrap();
        assert!(fixture.directory_exists());
        assert!(fixture.lock_exists());
        assert!(fixture.value_exists("k"));

        ns.close().unwrap();

        assert!(!fixture.directory_exists());
        assert!(!fixture.lock_exists());
        assert!(!fixture.value_exists("k"));

        let reopened = fixture.open(5);
        assert_eq!(reopened.size().unwrap(), 0);
        assert_eq!(reopened.capacity().unwrap(), 5);
        assert_eq!(reopened.get("k").unwrap(), None);
    }

    #[test]
    fn handles_with_different_configs_share_one_lock() {
        let fixture = Fixture::new();
        let first = fixture.open(4);
        let second = Arc::new(
            Container::open_with_config(&fixture.name, 4, Config::new().open_attempts(1)).unwrap(),
        );
        assert_eq!(first.info().unwrap().refcount, 2);

        let outside = fixture.outside_lock();
        let guard = outside.lock().unwrap();

        let written = Arc::new(AtomicBool::new(false));
        let writer = {
            let second = Arc::clone(&second);
            let written = Arc::clone(&written);
            thread::spawn(move || {
                second.set("k", b"v").unwrap();
                written.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!written.load(Ordering::SeqCst));

        guard.unlock().unwrap();
        writer.join().unwrap();
        assert!(written.load(Ordering::SeqCst));
        assert_eq!(first.get("k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn failed_create_leaves_nothing_behind() {
        let fixture = Fixture::new();
        // Fits in usize but no OS will size or map a segment this large.
        let capacity = usize::MAX / crate::directory::SLOT_SIZE - 1;

        let err =
            Container::open_with_config(&fixture.name, capacity, fixture.config.clone())
                .unwrap_err();

        assert!(err.is_resource_error(), "{err}");
        assert!(!fixture.directory_exists());
        assert!(!fixture.lock_exists());

        let ns = fixture.open(2);
        assert_eq!(ns.capacity().unwrap(), 2);
    }

    fn open_while_lock_retires(fixture: &Fixture, attempts: u32) -> CoreResult<Container> {
        let outside = fixture.outside_lock();
        let guard = outside.lock().unwrap();

        let opener = {
            let name = fixture.name.clone();
            thread::spawn(move || {
                Container::open_with_config(&name, 2, Config::new().open_attempts(attempts))
            })
        };

        // Let the opener block on the held lock, then retire it the way a
        // last close does.
        thread::sleep(Duration::from_millis(200));
        outside.unregister_name().unwrap();
        guard.unlock().unwrap();

        opener.join().unwrap()
    }

    #[test]
    fn open_retries_after_lock_is_retired() {
        let fixture = Fixture::new();

        let ns = open_while_lock_retires(&fixture, 2).unwrap();

        assert!(fixture.lock_exists());
        assert_eq!(ns.size().unwrap(), 0);
        assert_eq!(ns.close().unwrap(), CloseOutcome::LastClosed);
    }

    #[test]
    fn open_gives_up_after_attempts() {
        let fixture = Fixture::new();

        let result = open_while_lock_retires(&fixture, 1);

        assert!(matches!(
            result,
            Err(CoreError::StaleLock { attempts: 1, .. })
        ));
        assert!(!fixture.directory_exists());
        assert!(!fixture.lock_exists());
    }

    #[test]
    fn get_reports_value_removed_from_outside() {
        let fixture = Fixture::new();
        let ns = fixture.open(2);
        ns.set("k", b"v").unwrap();

        let value = fixture.namespace().value_segment_name("k").unwrap();
        assert!(Segment::unlink(&value).unwrap());

        match ns.get("k") {
            Err(CoreError::MissingValue { entry }) => assert_eq!(entry, "k"),
            other => panic!("expected MissingValue, got {other:?}"),
        }
        assert!(ns.contains("k").unwrap());
    }

    #[test]
    fn open_purges_table_left_by_unfinished_close() {
        let fixture = Fixture::new();
        let abandoned = fixture.open(4);
        abandoned.set("a", b"1").unwrap();
        abandoned.set("b", b"2").unwrap();

        // A handle whose close never finished: refcount already at zero,
        // entries still listed.
        {
            let mut segment = Segment::attach(fixture.namespace().segment_name())
                .unwrap()
                .unwrap();
            assert_eq!(
                Directory::open(segment.as_mut_slice()).unwrap().detach(),
                CloseOutcome::LastClosed
            );
            segment.close(false).unwrap();
        }
        std::mem::forget(abandoned);

        let ns = fixture.open(4);

        assert_eq!(ns.size().unwrap(), 0);
        assert!(!fixture.value_exists("a"));
        assert!(!fixture.value_exists("b"));
        assert_eq!(ns.close().unwrap(), CloseOutcome::LastClosed);
        assert!(!fixture.directory_exists());
    }

    #[test]
    fn drop_detaches() {
        let fixture = Fixture::new();
        let a = fixture.open(2);
        {
            let _b = fixture.open(2);
            assert_eq!(a.info().unwrap().refcount, 2);
        }
        assert_eq!(a.info().unwrap().refcount, 1);

        drop(a);
        assert!(!fixture.directory_exists());
    }

    #[test]
    fn invalid_names_are_rejected() {
        let fixture = Fixture::new();
        let ns = fixture.open(1);

        assert!(matches!(ns.set("", b"v"), Err(CoreError::InvalidName { .. })));
        assert!(matches!(ns.get("a/b"), Err(CoreError::InvalidName { .. })));
        assert!(matches!(
            Container::open_with_config("a|b", 1, fixture.config.clone()),
            Err(CoreError::InvalidName { .. })
        ));
        assert!(matches!(
            Container::open_with_config(&"n".repeat(255), 1, fixture.config.clone()),
            Err(CoreError::InvalidName { .. })
        ));
    }

    #[test]
    fn oversized_capacity_is_rejected() {
        let fixture = Fixture::new();
        let result =
            Container::open_with_config(&fixture.name, usize::MAX, fixture.config.clone());
        assert!(matches!(result, Err(CoreError::InvalidArgument { .. })));
    }

    #[test]
    fn zero_capacity_rejects_every_insert() {
        let fixture = Fixture::new();
        let ns = fixture.open(0);

        assert!(!ns.set("k", b"v").unwrap());
        assert!(!ns.add("k", b"v").unwrap());
        assert_eq!(ns.size().unwrap(), 0);
    }

    #[test]
    fn container_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Container>();
    }
}

//! Property checks for range clearing, resizing and mirroring

use devbuf::io::MAX_CAPACITY;
use devbuf::{BufferStore, DeviceError};
use proptest::prelude::*;

fn filled(capacity: usize, data: &[u8]) -> BufferStore {
    let mut store = BufferStore::new(capacity).unwrap();
    store.write(data).unwrap();
    store
}

proptest! {
    #[test]
    fn prop_clear_range_zeroes_exactly_the_range(
        data in proptest::collection::vec(1u8..=255, 1..256),
        a in 0usize..256,
        b in 0usize..256,
    ) {
        let capacity = 256;
        let (start, end) = (a.min(b), a.max(b));
        let mut store = filled(capacity, &data);
        let before = store.raw().to_vec();
        let used = store.len();

        store.clear_range(start, end).unwrap();

        for (i, (&now, &was)) in store.raw().iter().zip(&before).enumerate() {
            if (start..=end).contains(&i) {
                prop_assert_eq!(now, 0);
            } else {
                prop_assert_eq!(now, was);
            }
        }
        prop_assert_eq!(store.len(), used);
    }

    #[test]
    fn prop_resize_preserves_prefix(
        data in proptest::collection::vec(any::<u8>(), 0..1024),
        n in 1usize..=MAX_CAPACITY,
    ) {
        let mut store = filled(1024, &data);
        let before = store.raw().to_vec();
        let used = store.len();

        store.resize(n).unwrap();

        let keep = 1024usize.min(n);
        prop_assert_eq!(store.capacity(), n);
        prop_assert_eq!(&store.raw()[..keep], &before[..keep]);
        prop_assert!(store.raw()[keep..].iter().all(|&b| b == 0));
        prop_assert_eq!(store.len(), used.min(n));
    }

    #[test]
    fn prop_invalid_resize_changes_nothing(
        data in proptest::collection::vec(any::<u8>(), 0..64),
        n in prop_oneof![Just(0usize), (MAX_CAPACITY + 1)..100_000],
    ) {
        let mut store = filled(1024, &data);
        let before = store.raw().to_vec();

        let result = store.resize(n);
        prop_assert!(
            matches!(result, Err(DeviceError::InvalidSize { .. })),
            "unexpected result {:?}",
            result
        );
        prop_assert_eq!(store.raw(), &before[..]);
        prop_assert_eq!(store.len(), data.len());
    }

    #[test]
    fn prop_mirror_reverses_used_bytes(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let store = filled(1024, &data);
        let mut expected = data.clone();
        expected.reverse();
        prop_assert_eq!(store.mirror(), expected);
    }
}

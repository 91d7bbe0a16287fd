use verimap::{Digest, Ledger, LedgerError, LedgerHasher, Murmur3Hasher, Options};

/// Pins the ten test keys to fixed, well-spread digests so the page layout
/// of every version is stable; everything else hashes normally.
struct TenKeyHasher;

const TEN_KEYS: [(&str, u8); 10] = [
    ("One", 0x01),
    ("Two", 0x12),
    ("Three", 0x23),
    ("Four", 0x34),
    ("Five", 0x45),
    ("Six", 0x66),
    ("Seven", 0x87),
    ("Eight", 0xa8),
    ("Nine", 0xc9),
    ("Ten", 0xea),
];

impl LedgerHasher for TenKeyHasher {
    fn hash(parts: &[&[u8]]) -> Digest {
        if parts.len() == 1 {
            for (key, lead) in TEN_KEYS {
                if parts[0] == key.as_bytes() {
                    return [lead, lead, lead, lead, lead, lead, lead, lead];
                }
            }
        }
        Murmur3Hasher::hash(parts)
    }
}

fn ten_key_ledger() -> Ledger<TenKeyHasher> {
    Ledger::with_options(Options::new())
}

#[test]
fn erase_middle_version() {
    let ledger = ten_key_ledger();
    ledger.put("One", "1").unwrap();
    ledger.put("Two", "2").unwrap();
    ledger.put("Three", "3").unwrap();
    ledger.put("Four", "4").unwrap();
    ledger.put("Five", "5").unwrap();
    let six = ledger.put("Six", "6").unwrap();
    let seven = ledger.put("Seven", "7").unwrap();
    ledger.delete("Six").unwrap();
    ledger.put("Eight", "8").unwrap();
    ledger.put("Nine", "9").unwrap();
    ledger.put("Ten", "10").unwrap();

    ledger.erase_root_hash(&seven).unwrap();

    // the predecessor version still reads back in full
    assert_eq!(ledger.get_previous(&six, "Six").unwrap(), "6");
    // the erased version's pages are gone
    assert!(matches!(
        ledger.get_previous(&seven, "Six"),
        Err(LedgerError::PageMissing(_))
    ));

    ledger.erase_root_hash(&six).unwrap();
    assert!(matches!(
        ledger.get_previous(&six, "Six"),
        Err(LedgerError::PageMissing(_))
    ));

    // a hash can only be erased once
    assert!(matches!(
        ledger.erase_root_hash(&seven),
        Err(LedgerError::RootHashNotPresent(_))
    ));

    // the current version is unaffected by the erasures
    let all = ledger.get_all().unwrap();
    assert!(all.unknown.is_empty());
    assert_eq!(all.entries.len(), 9);
    assert_eq!(all.entries["One"], "1");
    assert_eq!(all.entries["Ten"], "10");
    assert!(!all.entries.contains_key("Six"));
}

#[test]
fn erase_leaves_other_versions_readable() {
    let ledger = ten_key_ledger();
    let mut roots = Vec::new();
    for (key, value) in [("One", "1"), ("Two", "2"), ("Three", "3"), ("Four", "4"), ("Five", "5")] {
        roots.push(ledger.put(key, value).unwrap());
    }

    ledger.erase_root_hash(&roots[2]).unwrap();

    assert_eq!(ledger.get_previous(&roots[1], "Two").unwrap(), "2");
    assert_eq!(ledger.get_previous(&roots[3], "Three").unwrap(), "3");
    assert_eq!(ledger.get_previous(&roots[3], "Four").unwrap(), "4");
    assert_eq!(ledger.get_previous(&roots[4], "Five").unwrap(), "5");
    assert_eq!(ledger.get("One").unwrap(), "1");
}

#[test]
fn erasing_an_unknown_hash_changes_nothing() {
    let ledger = ten_key_ledger();
    let root = ledger.put("One", "1").unwrap();
    assert!(matches!(
        ledger.erase_root_hash("AAAAAAAAAAAA"),
        Err(LedgerError::RootHashNotPresent(_))
    ));
    assert_eq!(ledger.root_hash(), root);
    assert_eq!(ledger.get("One").unwrap(), "1");
}

#[test]
fn recurring_state_erases_every_occurrence() {
    let ledger = ten_key_ledger();
    let first = ledger.put("One", "1").unwrap();
    ledger.put("Two", "2").unwrap();
    let recurred = ledger.delete("Two").unwrap();
    assert_eq!(first, recurred);

    ledger.put("Three", "3").unwrap();
    ledger.erase_root_hash(&first).unwrap();

    assert!(matches!(
        ledger.get_previous(&first, "One"),
        Err(LedgerError::PageMissing(_))
    ));
    assert!(matches!(
        ledger.erase_root_hash(&first),
        Err(LedgerError::RootHashNotPresent(_))
    ));
    // the surviving version still holds both keys
    assert_eq!(ledger.get("One").unwrap(), "1");
    assert_eq!(ledger.get("Three").unwrap(), "3");
}

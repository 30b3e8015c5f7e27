//! ESP-IDF partition table parsing used to find the credential partition.
use core::ops::Range;

pub const PARTITION_TABLE_OFFSET: u32 = 0x8000;
pub const PARTITION_TABLE_SIZE: usize = 0x1000;

const ENTRY_SIZE: usize = 32;
const ENTRY_MAGIC: [u8; 2] = [0xAA, 0x50];
const ERASED_MAGIC: [u8; 2] = [0xFF, 0xFF];
const LABEL_LEN: usize = 16;
const DATA_TYPE: u8 = 0x01;
const NVS_SUBTYPE: u8 = 0x02;
const CREDENTIAL_LABELS: [&str; 4] = ["vault", "credentials", "passwords", "pwd_store"];

/// One decoded data partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionEntry<'a> {
    pub subtype: u8,
    pub range: Range<u32>,
    label: &'a [u8],
}

enum Slot<'a> {
    End,
    Skip,
    Data(PartitionEntry<'a>),
}

impl<'a> PartitionEntry<'a> {
    fn decode(raw: &'a [u8]) -> Slot<'a> {
        let Some((header, rest)) = raw.split_first_chunk::<4>() else {
            return Slot::End;
        };
        let magic = [header[0], header[1]];
        if magic == ERASED_MAGIC {
            return Slot::End;
        }
        if magic != ENTRY_MAGIC || header[2] != DATA_TYPE {
            return Slot::Skip;
        }

        let Some((offset, rest)) = rest.split_first_chunk::<4>() else {
            return Slot::Skip;
        };
        let Some((size, rest)) = rest.split_first_chunk::<4>() else {
            return Slot::Skip;
        };
        let (offset, size) = (u32::from_le_bytes(*offset), u32::from_le_bytes(*size));
        let Some(end) = offset.checked_add(size).filter(|_| size > 0) else {
            return Slot::Skip;
        };

        let label = &rest[..LABEL_LEN.min(rest.len())];
        let label_end = label.iter().position(|&byte| byte == 0).unwrap_or(label.len());

        Slot::Data(PartitionEntry {
            subtype: header[3],
            range: offset..end,
            label: &label[..label_end],
        })
    }

    pub fn label(&self) -> Option<&'a str> {
        core::str::from_utf8(self.label).ok()
    }

    fn is_credential_store(&self) -> bool {
        self.label().is_some_and(|label| {
            CREDENTIAL_LABELS
                .iter()
                .any(|expected| label.eq_ignore_ascii_case(expected))
        })
    }
}

/// Data partitions listed in `table`, up to the first erased entry.
pub fn data_partitions(table: &[u8]) -> impl Iterator<Item = PartitionEntry<'_>> {
    table
        .chunks_exact(ENTRY_SIZE)
        .map(PartitionEntry::decode)
        .take_while(|slot| !matches!(slot, Slot::End))
        .filter_map(|slot| match slot {
            Slot::Data(entry) => Some(entry),
            Slot::End | Slot::Skip => None,
        })
}

/// Pick the partition that holds credentials.
///
/// A partition labelled for the vault wins; otherwise the first NVS data partition is used.
pub fn credential_partition(table: &[u8]) -> Option<Range<u32>> {
    let mut fallback = None;
    for entry in data_partitions(table) {
        if entry.is_credential_store() {
            return Some(entry.range);
        }
        if entry.subtype == NVS_SUBTYPE && fallback.is_none() {
            fallback = Some(entry.range);
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: u8, subtype: u8, offset: u32, size: u32, label: &str) -> [u8; ENTRY_SIZE] {
        let mut raw = [0u8; ENTRY_SIZE];
        raw[..2].copy_from_slice(&ENTRY_MAGIC);
        raw[2] = kind;
        raw[3] = subtype;
        raw[4..8].copy_from_slice(&offset.to_le_bytes());
        raw[8..12].copy_from_slice(&size.to_le_bytes());
        raw[12..12 + label.len()].copy_from_slice(label.as_bytes());
        raw
    }

    fn table(entries: &[[u8; ENTRY_SIZE]]) -> [u8; PARTITION_TABLE_SIZE] {
        let mut table = [0xFF; PARTITION_TABLE_SIZE];
        for (index, raw) in entries.iter().enumerate() {
            table[index * ENTRY_SIZE..(index + 1) * ENTRY_SIZE].copy_from_slice(raw);
        }
        table
    }

    #[test]
    fn labelled_partition_wins_over_nvs() {
        let table = table(&[
            entry(DATA_TYPE, NVS_SUBTYPE, 0x9000, 0x6000, "nvs"),
            entry(0x00, 0x10, 0x10000, 0x100000, "factory"),
            entry(DATA_TYPE, 0x81, 0x110000, 0x8000, "Vault"),
        ]);
        assert_eq!(credential_partition(&table), Some(0x110000..0x118000));
    }

    #[test]
    fn first_nvs_partition_is_the_fallback() {
        let table = table(&[
            entry(DATA_TYPE, 0x01, 0x9000, 0x1000, "phy_init"),
            entry(DATA_TYPE, NVS_SUBTYPE, 0xA000, 0x6000, "nvs"),
            entry(DATA_TYPE, NVS_SUBTYPE, 0x20000, 0x6000, "nvs2"),
        ]);
        assert_eq!(credential_partition(&table), Some(0xA000..0x10000));
    }

    #[test]
    fn scan_stops_at_erased_entry() {
        let mut raw = table(&[entry(DATA_TYPE, NVS_SUBTYPE, 0x9000, 0x6000, "nvs")]);
        let late = entry(DATA_TYPE, 0x81, 0x110000, 0x8000, "vault");
        raw[2 * ENTRY_SIZE..3 * ENTRY_SIZE].copy_from_slice(&late);

        assert_eq!(credential_partition(&raw), Some(0x9000..0xF000));
    }

    #[test]
    fn empty_and_overflowing_partitions_are_ignored() {
        let table = table(&[
            entry(DATA_TYPE, 0x81, 0x9000, 0, "vault"),
            entry(DATA_TYPE, 0x81, u32::MAX, 0x1000, "credentials"),
        ]);
        assert_eq!(data_partitions(&table).count(), 0);
        assert_eq!(credential_partition(&table), None);
    }

    #[test]
    fn labels_are_trimmed_at_nul() {
        let table = table(&[entry(DATA_TYPE, 0x81, 0x9000, 0x1000, "pwd_store")]);
        let entry = data_partitions(&table).next().expect("one entry");
        assert_eq!(entry.label(), Some("pwd_store"));
    }
}

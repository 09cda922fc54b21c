use std::collections::btree_map::{BTreeMap, Entry};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use npzeval_core::{EvalError, FormatError, NamedArray, Result};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::decode_array_stream;

/// Entry-name suffix that marks an array stream inside the container.
pub const ARRAY_SUFFIX: &str = ".npy";

/// Most bytes reserved up front for one entry; the declared size is untrusted.
const MAX_PREALLOC: u64 = 1 << 24;

/// Named arrays read from a zip container; immutable once built.
#[derive(Clone, Debug, Default)]
pub struct Archive {
    members: BTreeMap<String, NamedArray>,
}

impl Archive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| EvalError::archive(format!("cannot open {}", path.display()), e))?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes.as_ref()))
    }

    /// Decodes every array-stream entry. Any failure discards the whole archive.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut zip = ZipArchive::new(reader)
            .map_err(|e| EvalError::archive("not a readable zip container", e))?;

        let mut arrays = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| EvalError::archive(format!("cannot read entry #{i}"), e))?;
            let entry_name = entry.name().to_string();

            let Some(member) = member_name(&entry_name) else {
                if !entry.is_dir() {
                    warn!(entry = %entry_name, "ignoring non-array archive entry");
                }
                continue;
            };

            let mut raw = Vec::with_capacity(initial_capacity(entry.size()));
            entry
                .read_to_end(&mut raw)
                .map_err(|e| EvalError::archive(format!("cannot decompress `{entry_name}`"), e))?;

            let record = decode_array_stream(&raw)?;
            debug!(
                member,
                dtype = %record.dtype(),
                shape = %record.shape,
                bytes = raw.len(),
                "decoded archive member"
            );
            arrays.push(NamedArray::new(member, record));
        }

        Self::from_arrays(arrays)
    }

    pub fn from_arrays(arrays: impl IntoIterator<Item = NamedArray>) -> Result<Self> {
        let mut members = BTreeMap::new();
        for array in arrays {
            match members.entry(array.name().to_string()) {
                Entry::Occupied(slot) => {
                    return Err(FormatError::DuplicateMember(slot.key().clone()).into())
                }
                Entry::Vacant(slot) => {
                    slot.insert(array);
                }
            }
        }
        Ok(Self { members })
    }

    pub fn get(&self, name: &str) -> Option<&NamedArray> {
        self.members.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&NamedArray> {
        self.get(name)
            .ok_or_else(|| EvalError::MissingMember(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedArray> {
        self.members.values()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

fn initial_capacity(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_PREALLOC)).unwrap_or(0)
}

/// `dir/x.npy` -> `x`; `None` for entries that are not array streams.
fn member_name(entry_name: &str) -> Option<&str> {
    let base = entry_name.rsplit('/').next().unwrap_or(entry_name);
    base.strip_suffix(ARRAY_SUFFIX).filter(|name| !name.is_empty())
}

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::Path;

const COLOR_SEED: u64 = 0x7261_636b;

/// Tracker-facing class names, indexed by class id, with a drawing colour per class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassTable {
    names: Vec<String>,
    colors: Vec<[u8; 3]>,
}

impl ClassTable {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        let mut rng = StdRng::seed_from_u64(COLOR_SEED);
        let colors = names
            .iter()
            .map(|_| [rng.gen::<u8>(), rng.gen::<u8>(), rng.gen::<u8>()])
            .collect();

        Self { names, colors }
    }

    /// Reads one name per line, skipping blank lines. A missing or unreadable
    /// file yields an empty table so that tracking keeps running, it just
    /// can't label anything.
    ///
    /// A line that is not valid UTF-8 keeps its slot (lossily decoded) so the
    /// ids of the names after it don't shift.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        match std::fs::read(path) {
            Ok(bytes) => {
                let names: Vec<String> = bytes
                    .split(|&b| b == b'\n')
                    .enumerate()
                    .map(|(n, line)| match std::str::from_utf8(line) {
                        Ok(line) => line.trim().to_string(),
                        Err(err) => {
                            log::warn!("{}:{}: {}", path.display(), n + 1, err);
                            String::from_utf8_lossy(line).trim().to_string()
                        }
                    })
                    .filter(|line| !line.is_empty())
                    .collect();

                log::debug!("loaded {} class names from {}", names.len(), path.display());
                Self::new(names)
            }
            Err(err) => {
                log::warn!("class names file {} unavailable: {}", path.display(), err);
                Self::default()
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[inline]
    pub fn contains(&self, class_id: i32) -> bool {
        class_id >= 0 && (class_id as usize) < self.names.len()
    }

    pub fn name(&self, class_id: i32) -> Option<&str> {
        if !self.contains(class_id) {
            return None;
        }

        Some(self.names[class_id as usize].as_str())
    }

    pub fn color(&self, class_id: i32) -> Option<[u8; 3]> {
        if !self.contains(class_id) {
            return None;
        }

        Some(self.colors[class_id as usize])
    }

    /// Case-insensitive lookup of a class id by name.
    pub fn id_of(&self, name: &str) -> Option<i32> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name.trim()))
            .map(|idx| idx as i32)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(idx, name)| (idx as i32, name.as_str()))
    }
}

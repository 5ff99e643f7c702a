use std::io::BufRead;
use std::path::Path;

use super::{
    bounding_box::Detection,
    error::{Result, YoloV5Error},
};

/// Ordered list of class labels, indexed by class id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    /// Read one label per line, e.g. a `coco.names` file.
    ///
    /// Trailing whitespace is trimmed and blank lines are skipped.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut names = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let name = line.trim_end();
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
        if names.is_empty() {
            return Err(YoloV5Error::EmptyClassNames);
        }
        Ok(Self { names })
    }

    /// Read the labels from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let names = Self::from_reader(std::io::BufReader::new(file))?;
        tracing::info!("loaded {} class names from {}", names.len(), path.display());
        Ok(names)
    }

    /// The label of a class id.
    pub fn get(&self, class: u32) -> Option<&str> {
        self.names.get(class as usize).map(String::as_str)
    }

    /// The label of a detection, warning when the class id is unknown.
    pub fn label_for(&self, detection: &Detection) -> Option<&str> {
        let label = self.get(detection.class);
        if label.is_none() {
            tracing::warn!(
                "class id {} is outside the {} known class names",
                detection.class,
                self.names.len()
            );
        }
        label
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the list has no labels.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl From<Vec<String>> for ClassNames {
    fn from(names: Vec<String>) -> Self {
        Self { names }
    }
}

//! The synset table and flat index resolution.

use crate::common::*;

/// Load the synset list file.
///
/// Each non-empty line holds a synset id optionally followed by a
/// description, e.g. `n01440764 tench, Tinca tinca`.
pub fn load_synsets_file(path: impl AsRef<Path>) -> Result<IndexMap<String, String>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read synsets file '{}'", path.display()))?;
    parse_synsets(&content).with_context(|| format!("invalid synsets file '{}'", path.display()))
}

fn parse_synsets(content: &str) -> Result<IndexMap<String, String>> {
    let mut synsets = IndexMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (wnid, desc) = match line.split_once(char::is_whitespace) {
            Some((wnid, desc)) => (wnid, desc.trim()),
            None => (line, ""),
        };
        let prev = synsets.insert(wnid.to_owned(), desc.to_owned());
        ensure!(prev.is_none(), "duplicated synset '{}'", wnid);
    }

    ensure!(!synsets.is_empty(), "no synsets found");
    Ok(synsets)
}

/// The immutable table of synsets and their annotated samples.
///
/// Samples are numbered synset-major in table order. Within a synset they
/// follow the lexicographic order of annotation file names.
#[derive(Debug, Clone)]
pub struct SynsetTable {
    synsets: IndexSet<String>,
    annotation_dir: PathBuf,
    /// Sorted annotation file names per synset.
    files: Vec<Vec<String>>,
    /// `cumulative[i]` is the exclusive end index of synset `i`.
    cumulative: Vec<usize>,
}

impl SynsetTable {
    /// Scan `<data_dir>/Annotation/<synset>/` for every synset.
    ///
    /// Synsets without an annotation directory get zero samples.
    pub fn build(data_dir: impl AsRef<Path>, synsets: IndexSet<String>) -> Result<Self> {
        let annotation_dir = data_dir.as_ref().join("Annotation");
        ensure!(
            annotation_dir.is_dir(),
            "annotation directory '{}' does not exist",
            annotation_dir.display()
        );

        let files: Vec<_> = synsets
            .iter()
            .map(|synset| list_annotation_files(&annotation_dir.join(synset)))
            .try_collect()?;
        let counts: Vec<_> = files.iter().map(Vec::len).collect();

        Ok(Self::from_parts(synsets, annotation_dir, files, &counts))
    }

    fn from_parts(
        synsets: IndexSet<String>,
        annotation_dir: PathBuf,
        files: Vec<Vec<String>>,
        counts: &[usize],
    ) -> Self {
        let cumulative: Vec<_> = counts
            .iter()
            .scan(0, |sum, &count| {
                *sum += count;
                Some(*sum)
            })
            .collect();

        Self {
            synsets,
            annotation_dir,
            files,
            cumulative,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.synsets.len()
    }

    pub fn synsets(&self) -> &IndexSet<String> {
        &self.synsets
    }

    pub fn synset(&self, class_id: usize) -> Option<&str> {
        self.synsets.get_index(class_id).map(String::as_str)
    }

    pub fn class_count(&self, class_id: usize) -> usize {
        self.files.get(class_id).map(Vec::len).unwrap_or(0)
    }

    pub fn cumulative_counts(&self) -> &[usize] {
        &self.cumulative
    }

    pub fn total_count(&self) -> usize {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// The class owning the sample at `global_index`.
    ///
    /// It is the smallest class id whose cumulative count reaches
    /// `global_index + 1`. Returns `num_classes()` for indices past the end.
    pub fn class_of(&self, global_index: usize) -> usize {
        self.cumulative.partition_point(|&end| end < global_index + 1)
    }

    /// The offset of `global_index` inside the sample range of `class_id`.
    pub fn position_within_class(&self, global_index: usize, class_id: usize) -> usize {
        match class_id {
            0 => global_index,
            _ => global_index - self.cumulative[class_id - 1],
        }
    }

    /// Resolve a flat index to `(class_id, position_within_class)`.
    pub fn locate(&self, global_index: usize) -> Option<(usize, usize)> {
        if global_index >= self.total_count() {
            return None;
        }
        let class_id = self.class_of(global_index);
        Some((class_id, self.position_within_class(global_index, class_id)))
    }

    /// The path of the annotation file at `position` of `class_id`.
    pub fn annotation_path(&self, class_id: usize, position: usize) -> Option<PathBuf> {
        let synset = self.synset(class_id)?;
        let file_name = self.files.get(class_id)?.get(position)?;
        Some(self.annotation_dir.join(synset).join(file_name))
    }
}

fn list_annotation_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }

    let mut names: Vec<String> = fs::read_dir(dir)
        .with_context(|| format!("failed to list directory '{}'", dir.display()))?
        .map(|entry| -> Result<_> {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                return Ok(None);
            }
            let name = entry
                .file_name()
                .into_string()
                .map_err(|name| format_err!("non UTF-8 file name {:?}", name))?;
            Ok(Some(name))
        })
        .filter_map(|result| result.transpose())
        .try_collect()
        .with_context(|| format!("failed to list directory '{}'", dir.display()))?;
    names.sort();

    Ok(names)
}

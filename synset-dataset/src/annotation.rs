//! Image annotation records and the XML annotation parser.

use crate::common::*;

/// One annotated image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageAnnotation {
    /// The image folder relative to the image root.
    pub folder: String,
    /// The image file name without extension.
    pub filename: String,
    #[serde(rename = "object", default)]
    pub objects: Vec<ObjectAnnotation>,
}

impl ImageAnnotation {
    /// Find the first object labeled with `synset`.
    pub fn find_object(&self, synset: &str) -> Option<&ObjectAnnotation> {
        self.objects.iter().find(|obj| obj.name == synset)
    }

    /// The expected location of the image under `image_dir`.
    pub fn image_path(&self, image_dir: &Path) -> PathBuf {
        image_dir
            .join(&self.folder)
            .join(format!("{}.JPEG", self.filename))
    }
}

/// The box of one object in pixel units.
///
/// Nothing guarantees `xmax > xmin` or `ymax > ymin` in the source data.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawObject")]
pub struct ObjectAnnotation {
    pub name: String,
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl ObjectAnnotation {
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn try_to_tlbr(&self) -> Result<TLBR<f64>> {
        TLBR::try_from_tlbr([self.ymin, self.xmin, self.ymax, self.xmax])
            .with_context(|| format!("invalid box of object '{}'", self.name))
    }
}

#[derive(Debug, Deserialize)]
struct RawObject {
    name: String,
    bndbox: RawBndBox,
}

#[derive(Debug, Deserialize)]
struct RawBndBox {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

impl From<RawObject> for ObjectAnnotation {
    fn from(from: RawObject) -> Self {
        let RawObject {
            name,
            bndbox:
                RawBndBox {
                    xmin,
                    ymin,
                    xmax,
                    ymax,
                },
        } = from;
        Self {
            name,
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }
}

/// Parse an annotation file.
pub fn parse_annotation(path: impl AsRef<Path>) -> Result<ImageAnnotation> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read annotation file '{}'", path.display()))?;
    parse_annotation_str(&text)
        .with_context(|| format!("failed to parse annotation file '{}'", path.display()))
}

pub fn parse_annotation_str(text: &str) -> Result<ImageAnnotation> {
    let annotation = serde_xml_rs::from_str(text)?;
    Ok(annotation)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<annotation>
	<folder>n01440764</folder>
	<filename>n01440764_10026</filename>
	<source>
		<database>ImageNet database</database>
	</source>
	<size>
		<width>250</width>
		<height>250</height>
		<depth>3</depth>
	</size>
	<segmented>0</segmented>
	<object>
		<name>n01440764</name>
		<pose>Unspecified</pose>
		<truncated>0</truncated>
		<difficult>0</difficult>
		<bndbox>
			<xmin>3</xmin>
			<ymin>21</ymin>
			<xmax>190</xmax>
			<ymax>214</ymax>
		</bndbox>
	</object>
	<object>
		<name>n02085620</name>
		<pose>Unspecified</pose>
		<truncated>0</truncated>
		<difficult>0</difficult>
		<bndbox>
			<xmin>10</xmin>
			<ymin>12</ymin>
			<xmax>40</xmax>
			<ymax>52</ymax>
		</bndbox>
	</object>
</annotation>"#;

    #[test]
    fn parse_imagenet_annotation() {
        let annotation = parse_annotation_str(SAMPLE).unwrap();
        assert_eq!(annotation.folder, "n01440764");
        assert_eq!(annotation.filename, "n01440764_10026");
        assert_eq!(annotation.objects.len(), 2);

        let obj = annotation.find_object("n02085620").unwrap();
        assert_eq!(obj.xmin, 10.0);
        assert_eq!(obj.ymax, 52.0);
        assert_eq!(obj.width(), 30.0);
        assert_eq!(obj.height(), 40.0);
        assert!(annotation.find_object("n99999999").is_none());

        assert_eq!(
            annotation.image_path(Path::new("Image")),
            Path::new("Image/n01440764/n01440764_10026.JPEG")
        );
    }

    #[test]
    fn inverted_box_is_reported() {
        let obj = ObjectAnnotation {
            name: "n01440764".into(),
            xmin: 10.0,
            ymin: 10.0,
            xmax: 5.0,
            ymax: 20.0,
        };
        assert!(obj.try_to_tlbr().is_err());
    }

    #[test]
    fn annotation_without_objects() {
        let annotation = parse_annotation_str(
            "<annotation><folder>f</folder><filename>x</filename></annotation>",
        )
        .unwrap();
        assert!(annotation.objects.is_empty());
    }
}

use super::ffmpeg::{spawn_error, stderr_of};
use crate::domain::errors::EngineError;
use crate::ports::engines::{RecognizedText, TextRecognizer};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// OCR through the `tesseract` binary in TSV mode.
#[derive(Clone, Debug)]
pub struct TesseractCli {
    bin: String,
}

impl TesseractCli {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl TextRecognizer for TesseractCli {
    async fn recognize(&self, image: &Path) -> Result<Vec<RecognizedText>, EngineError> {
        let output = Command::new(&self.bin)
            .arg(image)
            .arg("stdout")
            .arg("tsv")
            .output()
            .await
            .map_err(|e| spawn_error(&self.bin, e))?;

        if !output.status.success() {
            return Err(EngineError::Request(stderr_of(&output)));
        }
        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Word rows of tesseract's TSV output. Structural rows carry confidence -1
/// and no text; they are dropped here.
pub(crate) fn parse_tsv(tsv: &str) -> Vec<RecognizedText> {
    tsv.lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 12 {
                return None;
            }
            let confidence: f64 = cols[10].trim().parse().ok()?;
            let text = cols[11].trim();
            if confidence < 0.0 || text.is_empty() {
                return None;
            }
            Some(RecognizedText {
                text: text.to_string(),
                confidence,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tsv_keeps_words() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                   1\t1\t0\t0\t0\t0\t0\t0\t640\t360\t-1\t\n\
                   5\t1\t1\t1\t1\t1\t10\t10\t80\t20\t96.123\tNVIDIA\n\
                   5\t1\t1\t1\t1\t2\t95\t10\t40\t20\t31\tAI\n\
                   5\t1\t1\t1\t1\t3\t95\t10\t40\t20\t88\t   \n";
        let words = parse_tsv(tsv);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "NVIDIA");
        assert!((words[0].confidence - 96.123).abs() < 1e-9);
        assert_eq!(words[1].text, "AI");
    }

    #[test]
    fn test_parse_tsv_ignores_short_rows() {
        assert!(parse_tsv("header\nnot\ta\trow\n").is_empty());
    }
}

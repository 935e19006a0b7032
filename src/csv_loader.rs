use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use csv::{ReaderBuilder, StringRecord};

use crate::types::{FeatureVector, LabeledSample};

/// Carga las muestras grabadas en un CSV con formato class_id,f0,...,fN
/// (sin encabezado). Si `expected_len` se indica, cada fila debe tener
/// exactamente ese número de características.
pub fn load_samples_from_csv(
    path: impl AsRef<Path>,
    expected_len: Option<usize>,
) -> Result<Vec<LabeledSample>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut samples = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;
        let sample = parse_record(&record)
            .with_context(|| format!("Fila {} de {:?}", row_idx + 1, path))?;

        if let Some(expected) = expected_len {
            ensure!(
                sample.features.len() == expected,
                "La fila {} tiene {} características, se esperaban {}",
                row_idx + 1,
                sample.features.len(),
                expected
            );
        }
        samples.push(sample);
    }

    ensure!(!samples.is_empty(), "El CSV {:?} no contiene muestras", path);
    Ok(samples)
}

/// Interpreta una fila ya separada en campos
pub fn parse_record(record: &StringRecord) -> Result<LabeledSample> {
    if record.len() < 2 {
        bail!("La fila necesita class_id y al menos una característica");
    }

    let class_id: i32 = record[0]
        .trim()
        .parse()
        .with_context(|| format!("class_id inválido: {:?}", &record[0]))?;

    let values = record
        .iter()
        .skip(1)
        .enumerate()
        .map(|(idx, field)| {
            field
                .trim()
                .parse::<f32>()
                .with_context(|| format!("Característica {} inválida: {:?}", idx, field))
        })
        .collect::<Result<Vec<f32>>>()?;

    Ok(LabeledSample {
        class_id,
        features: FeatureVector::from_values(values),
    })
}

/// Interpreta una fila de texto suelta
pub fn parse_row(row: &str) -> Result<LabeledSample> {
    let record = StringRecord::from(row.trim_end().split(',').collect::<Vec<&str>>());
    parse_record(&record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_recorder::{format_row, SampleRecorder};
    use crate::types::TOTAL_FEATURES;
    use tempfile::tempdir;

    fn wavy_vector() -> FeatureVector {
        FeatureVector::from_values(
            (0..TOTAL_FEATURES)
                .map(|i| (i as f32 * 0.37).sin() * 90.0)
                .collect(),
        )
    }

    #[test]
    fn test_recorded_sample_parses_back_within_precision() {
        let original = LabeledSample {
            class_id: 2,
            features: wavy_vector(),
        };

        let parsed = parse_row(&format_row(&original)).unwrap();

        assert_eq!(parsed.class_id, 2);
        assert_eq!(parsed.features.len(), TOTAL_FEATURES);
        for (a, b) in original
            .features
            .as_slice()
            .iter()
            .zip(parsed.features.as_slice())
        {
            assert!((a - b).abs() <= 1e-5, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_load_file_written_by_recorder() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.csv");
        let mut recorder = SampleRecorder::new(&path, true);
        recorder.record_sample(0, &wavy_vector()).unwrap();
        recorder.record_sample(1, &wavy_vector()).unwrap();
        recorder.end_session().unwrap();

        let samples = load_samples_from_csv(&path, Some(TOTAL_FEATURES)).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].class_id, 1);
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.csv");
        std::fs::write(&path, "1,0.5,0.25\n").unwrap();

        assert!(load_samples_from_csv(&path, Some(TOTAL_FEATURES)).is_err());
        assert_eq!(load_samples_from_csv(&path, None).unwrap().len(), 1);
    }

    #[test]
    fn test_bad_class_id_is_rejected() {
        assert!(parse_row("abc,1.0,2.0").is_err());
        assert!(parse_row("1").is_err());
    }
}

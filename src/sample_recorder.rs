use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::types::{FeatureVector, LabeledSample};

/// Decimales con los que se escribe cada característica
pub const CSV_DECIMALS: usize = 8;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("No hay sesión de grabación activa")]
    NotRecording,

    #[error("No se pudo crear el directorio {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No se pudo abrir {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Error escribiendo muestras en {path:?}: {source}")]
    Write { path: PathBuf, source: csv::Error },
}

/// Campos CSV de una muestra: class_id seguido de las características con 8 decimales
pub fn sample_fields(sample: &LabeledSample) -> Vec<String> {
    let mut fields = Vec::with_capacity(sample.features.len() + 1);
    fields.push(sample.class_id.to_string());
    fields.extend(
        sample
            .features
            .as_slice()
            .iter()
            .map(|v| format!("{:.*}", CSV_DECIMALS, v)),
    );
    fields
}

/// Fila CSV (sin salto de línea) de una muestra
pub fn format_row(sample: &LabeledSample) -> String {
    sample_fields(sample).join(",")
}

/// Acumula muestras etiquetadas en memoria y las añade al CSV al cerrar la sesión
pub struct SampleRecorder {
    output_path: PathBuf,
    buffer: Vec<LabeledSample>,
    recording: bool,
}

impl SampleRecorder {
    pub fn new(output_path: impl Into<PathBuf>, start_recording: bool) -> Self {
        Self {
            output_path: output_path.into(),
            buffer: Vec::new(),
            recording: start_recording,
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Número de muestras pendientes de volcar
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Descarta lo acumulado y entra en modo grabación
    pub fn begin_session(&mut self) {
        if !self.buffer.is_empty() {
            debug!("Descartando {} muestras sin volcar", self.buffer.len());
        }
        self.buffer.clear();
        self.recording = true;
    }

    pub fn record_sample(
        &mut self,
        class_id: i32,
        features: &FeatureVector,
    ) -> Result<(), RecorderError> {
        if !self.recording {
            return Err(RecorderError::NotRecording);
        }

        let sample = LabeledSample {
            class_id,
            features: features.clone(),
        };
        debug!("{}", format_row(&sample));
        self.buffer.push(sample);
        Ok(())
    }

    /// Sale del modo grabación y añade las muestras al final del archivo.
    /// Devuelve cuántas filas se escribieron. Si la escritura falla, en memoria
    /// quedan solo las muestras que no llegaron al archivo.
    pub fn end_session(&mut self) -> Result<usize, RecorderError> {
        self.recording = false;

        if self.buffer.is_empty() {
            return Ok(0);
        }

        let written = self.append_rows()?;
        info!(
            "💾 {} muestras añadidas a {}",
            written,
            self.output_path.display()
        );
        Ok(written)
    }

    fn append_rows(&mut self) -> Result<usize, RecorderError> {
        let path = &self.output_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RecorderError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| RecorderError::Open {
                path: path.clone(),
                source,
            })?;

        let path = path.clone();
        self.write_rows(file)
            .map_err(|source| RecorderError::Write { path, source })
    }

    /// Escribe fila a fila, vaciando el writer tras cada una, y saca del buffer
    /// las que ya se escribieron aunque una posterior falle
    fn write_rows<W: Write>(&mut self, out: W) -> Result<usize, csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(out);

        let mut written = 0;
        let mut failure = None;
        for sample in &self.buffer {
            let result = writer
                .write_record(sample_fields(sample))
                .and_then(|_| writer.flush().map_err(csv::Error::from));
            if let Err(err) = result {
                failure = Some(err);
                break;
            }
            written += 1;
        }

        self.buffer.drain(..written);
        match failure {
            Some(err) => Err(err),
            None => Ok(written),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TOTAL_FEATURES;
    use log::{LevelFilter, Log, Metadata, Record};
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn sample_vector() -> FeatureVector {
        FeatureVector::from_values((0..TOTAL_FEATURES).map(|i| i as f32 * 0.25).collect())
    }

    #[test]
    fn test_single_session_appends_one_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.csv");
        let mut recorder = SampleRecorder::new(&path, false);

        recorder.begin_session();
        recorder.record_sample(3, &sample_vector()).unwrap();
        assert_eq!(recorder.end_session().unwrap(), 1);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);

        let fields: Vec<&str> = lines[0].split(',').collect();
        assert_eq!(fields.len(), TOTAL_FEATURES + 1);
        assert_eq!(fields[0], "3");
        assert_eq!(fields[1], "0.00000000");
        assert_eq!(fields[2], "0.25000000");
        assert_eq!(fields[56], "13.75000000");
    }

    #[test]
    fn test_second_end_session_appends_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.csv");
        let mut recorder = SampleRecorder::new(&path, true);

        recorder.record_sample(1, &sample_vector()).unwrap();
        recorder.end_session().unwrap();
        let before = fs::read_to_string(&path).unwrap();

        assert_eq!(recorder.end_session().unwrap(), 0);
        let after = fs::read_to_string(&path).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_sessions_append_without_truncating() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("points.csv");
        fs::write(&path, "previa\n").unwrap();

        let mut recorder = SampleRecorder::new(&path, false);
        recorder.begin_session();
        recorder.record_sample(0, &sample_vector()).unwrap();
        recorder.end_session().unwrap();
        recorder.begin_session();
        recorder.record_sample(2, &sample_vector()).unwrap();
        recorder.end_session().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "previa");
        assert!(lines[1].starts_with("0,"));
        assert!(lines[2].starts_with("2,"));
    }

    #[test]
    fn test_begin_session_discards_buffer() {
        let dir = tempdir().unwrap();
        let mut recorder = SampleRecorder::new(dir.path().join("points.csv"), true);
        recorder.record_sample(1, &sample_vector()).unwrap();
        assert_eq!(recorder.pending(), 1);

        recorder.begin_session();
        assert_eq!(recorder.pending(), 0);
        assert!(recorder.is_recording());
    }

    #[test]
    fn test_record_outside_session_fails() {
        let dir = tempdir().unwrap();
        let mut recorder = SampleRecorder::new(dir.path().join("points.csv"), false);
        assert!(matches!(
            recorder.record_sample(1, &sample_vector()),
            Err(RecorderError::NotRecording)
        ));
    }

    #[test]
    fn test_write_failure_keeps_samples() {
        let dir = tempdir().unwrap();
        // El destino es un directorio: abrirlo como archivo falla
        let mut recorder = SampleRecorder::new(dir.path(), true);
        recorder.record_sample(4, &sample_vector()).unwrap();

        assert!(recorder.end_session().is_err());
        assert_eq!(recorder.pending(), 1);
        assert!(!recorder.is_recording());
    }

    /// Acepta `budget` bytes y luego falla
    struct ShortSink {
        accepted: Vec<u8>,
        budget: usize,
    }

    impl Write for ShortSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.budget == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disco lleno"));
            }
            let n = buf.len().min(self.budget);
            self.accepted.extend_from_slice(&buf[..n]);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_partial_write_keeps_only_unwritten_samples() {
        let dir = tempdir().unwrap();
        let mut recorder = SampleRecorder::new(dir.path().join("points.csv"), true);
        recorder.record_sample(1, &sample_vector()).unwrap();
        recorder.record_sample(2, &sample_vector()).unwrap();
        recorder.record_sample(3, &sample_vector()).unwrap();

        let row_len = format_row(&recorder.buffer[0]).len() + 1;
        let mut sink = ShortSink {
            accepted: Vec::new(),
            budget: row_len + 10,
        };

        assert!(recorder.write_rows(&mut sink).is_err());
        assert_eq!(&sink.accepted[..row_len - 1], format_row(&recorder_sample(1)).as_bytes());
        // La primera fila ya está en el destino; un reintento no debe repetirla
        assert_eq!(recorder.pending(), 2);
        assert_eq!(recorder.buffer[0].class_id, 2);
        assert_eq!(recorder.buffer[1].class_id, 3);
    }

    fn recorder_sample(class_id: i32) -> LabeledSample {
        LabeledSample {
            class_id,
            features: sample_vector(),
        }
    }

    static LOGGED: Mutex<Vec<String>> = Mutex::new(Vec::new());

    struct RowCapture;

    impl Log for RowCapture {
        fn enabled(&self, _metadata: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            if record.target().ends_with("sample_recorder") {
                LOGGED.lock().unwrap().push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }

    static CAPTURE: RowCapture = RowCapture;

    #[test]
    fn test_recorded_row_goes_to_log() {
        let _ = log::set_logger(&CAPTURE);
        log::set_max_level(LevelFilter::Debug);

        let dir = tempdir().unwrap();
        let mut recorder = SampleRecorder::new(dir.path().join("points.csv"), true);
        recorder.record_sample(9137, &sample_vector()).unwrap();

        let expected = format_row(&recorder_sample(9137));
        assert!(LOGGED.lock().unwrap().iter().any(|line| *line == expected));
    }

    #[test]
    fn test_format_row_uses_eight_decimals() {
        let sample = LabeledSample {
            class_id: 7,
            features: FeatureVector::from_values(vec![1.0, -0.5, 0.123456789]),
        };
        assert_eq!(format_row(&sample), "7,1.00000000,-0.50000000,0.12345679");
    }
}

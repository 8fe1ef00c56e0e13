//! Bin a small wearing-detection export into hourly rows and print the table

use chrono::Duration;
use streamdash::{BinAggregator, BinConfig, Modality, ParticipantId, TimeSeriesLoader};
use streamdash::encoder::TableEncoder;

fn main() {
    let csv = "timestamp_iso,wearing_detection_percentage\n\
               2024-01-15T08:00:00,100\n\
               2024-01-15T08:30:00,100\n\
               2024-01-15T09:15:00,0\n\
               not-a-time,100\n\
               2024-01-15T11:05:00,80\n";

    let path = std::env::temp_dir().join("streamdash_hourly_summary.csv");
    if let Err(e) = std::fs::write(&path, csv) {
        eprintln!("Error: {e}");
        return;
    }

    let participant = ParticipantId::new("HC_009");
    let result = TimeSeriesLoader::for_modality(Modality::Wristband).and_then(|loader| {
        let outcome = loader.load(&participant, Modality::Wristband, &path)?;
        for rejected in &outcome.rejected {
            eprintln!("rejected {rejected}");
        }
        let config = BinConfig::hourly(Duration::minutes(30))?;
        let bins = BinAggregator::aggregate(&outcome.samples, &config)?;
        TableEncoder::new().to_csv(&bins)
    });

    let _ = std::fs::remove_file(&path);

    match result {
        Ok(table) => print!("{table}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}

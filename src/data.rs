/*
 * Copyright 2019 DTAI Research Group - KU Leuven.
 * License: Apache License 2.0
 * Author: Laurens Devos
*/

use std::io::{Read, BufReader};
use std::path::Path;
use std::fs::File;

use csv;
use flate2::read::GzDecoder;

use crate::NumT;
use crate::config::Config;

/// Largest rank label accepted from a data file.
pub const MAX_RANK: usize = 1 << 16;

/// Open a file for reading, transparently decompressing `.gz` files.
pub fn open_reader<P: AsRef<Path>>(path: P) -> Result<Box<dyn Read>, String> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|err| format!("path error '{}': {}", path.display(), err))?;
    let reader = BufReader::new(file);
    if path.extension().map_or(false, |ext| ext == "gz") {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Ranked examples. The last column of every record is the rank, all others are features.
/// Features are stored row-major.
pub struct Data {
    names: Vec<String>,
    nfeatures: usize,
    nexamples: usize,
    features: Vec<NumT>,
    ranks: Vec<usize>,
    max_rank: usize,
}

impl Data {
    pub fn from_csv_path<P: AsRef<Path>>(config: &Config, path: P) -> Result<Data, String> {
        let reader = open_reader(path)?;
        Data::from_csv_reader(config, reader)
    }

    pub fn from_csv_reader<R>(config: &Config, mut reader: R) -> Result<Data, String>
    where R: Read
    {
        let mut csv = String::new();
        reader.read_to_string(&mut csv).map_err(|err| format!("read_to_string err: {}", err))?;
        Self::from_csv(config, &csv)
    }

    pub fn from_csv(config: &Config, csv: &str) -> Result<Data, String> {
        let mut record_len = 0;
        let mut record_count = 0;
        let mut features = Vec::new();
        let mut ranks = Vec::new();
        let mut values = Vec::new();
        let mut record = csv::StringRecord::new();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(config.csv_has_header)
            .delimiter(config.csv_delimiter)
            .flexible(true)
            .from_reader(csv.as_bytes());

        loop {
            match reader.read_record(&mut record) {
                Ok(false) => break,
                Err(err) => return Err(format!("CSV error: {}", err)),
                Ok(true) => {
                    // runs of delimiters (aligned whitespace columns) produce empty fields
                    values.clear();
                    for field in record.iter().map(|x| x.trim()).filter(|x| !x.is_empty()) {
                        let value = field.parse::<NumT>()
                            .map_err(|_| format!("Parse error at record {}: '{}'",
                                                 record_count, field))?;
                        values.push(value);
                    }
                    if values.is_empty() { continue; }

                    if record_count == 0 {
                        record_len = values.len();
                        if record_len < 2 {
                            return Err(String::from("a record needs at least one feature and a rank"));
                        }
                    } else if values.len() != record_len {
                        return Err(format!("record {} has {} values, expected {}",
                                           record_count, values.len(), record_len));
                    }

                    let rank = parse_rank(values[record_len - 1], config.n_rank)
                        .map_err(|msg| format!("{} at record {}", msg, record_count))?;
                    features.extend_from_slice(&values[0..record_len - 1]);
                    ranks.push(rank);
                }
            }
            record_count += 1;
        }

        if record_count == 0 {
            return Err(String::from("no records"));
        }

        // extract feature names from header
        let mut names = vec![String::new(); record_len - 1];
        if config.csv_has_header {
            reader.headers()
                .map_err(|err| format!("CSV header error: {}", err))?
                .into_iter()
                .filter(|x| !x.trim().is_empty())
                .take(record_len - 1)
                .enumerate()
                .for_each(|(i, name)| names[i].push_str(name.trim()));
        }

        let max_rank = ranks.iter().cloned().max().unwrap_or(0);

        Ok(Data {
            names,
            nfeatures: record_len - 1, // last is rank
            nexamples: record_count,
            features,
            ranks,
            max_rank,
        })
    }

    /// Build a data set from in-memory rows.
    pub fn from_rows(rows: &[Vec<NumT>], ranks: &[usize]) -> Data {
        assert_eq!(rows.len(), ranks.len());
        assert!(!rows.is_empty());
        assert!(ranks.iter().all(|&r| r >= 1));
        let nfeatures = rows[0].len();
        let mut features = Vec::with_capacity(nfeatures * rows.len());
        for row in rows {
            assert_eq!(row.len(), nfeatures);
            features.extend_from_slice(row);
        }
        Data {
            names: vec![String::new(); nfeatures],
            nfeatures,
            nexamples: rows.len(),
            features,
            ranks: ranks.to_vec(),
            max_rank: ranks.iter().cloned().max().unwrap_or(0),
        }
    }

    pub fn nfeatures(&self) -> usize { self.nfeatures }
    pub fn nexamples(&self) -> usize { self.nexamples }
    pub fn feat_name(&self, feat_id: usize) -> &str { &self.names[feat_id] }
    pub fn max_rank(&self) -> usize { self.max_rank }
    pub fn ranks(&self) -> &[usize] { &self.ranks }
    pub fn rank(&self, i: usize) -> usize { self.ranks[i] }

    pub fn example(&self, i: usize) -> &[NumT] {
        let start = i * self.nfeatures;
        &self.features[start..start + self.nfeatures]
    }

    /// Copy one feature column into `buffer`.
    pub fn feature_column(&self, feat_id: usize, buffer: &mut Vec<NumT>) {
        buffer.clear();
        buffer.extend((0..self.nexamples).map(|i| self.features[i * self.nfeatures + feat_id]));
    }
}

fn parse_rank(value: NumT, n_rank: usize) -> Result<usize, String> {
    if value.round() != value || value < 1.0 || value > MAX_RANK as NumT {
        return Err(format!("Invalid rank {}", value));
    }
    let rank = value as usize;
    if n_rank > 0 && rank > n_rank {
        return Err(format!("Rank {} exceeds n_rank={}", rank, n_rank));
    }
    Ok(rank)
}






// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use crate::config::Config;
    use super::*;

    #[test]
    fn basic_with_header() {
        let mut config = Config::new();
        config.csv_has_header = true;
        config.csv_delimiter = b';';

        let data = Data::from_csv(&config, "a;bb;ccc;r\n1.0;2.0;0.0;1\n4;5;1;3\n\n").unwrap();

        assert_eq!(data.nfeatures(), 3);
        assert_eq!(data.nexamples(), 2);
        assert_eq!(data.example(0), &[1.0, 2.0, 0.0]);
        assert_eq!(data.example(1), &[4.0, 5.0, 1.0]);
        assert_eq!(data.feat_name(0), "a");
        assert_eq!(data.feat_name(1), "bb");
        assert_eq!(data.feat_name(2), "ccc");
        assert_eq!(data.ranks(), &[1, 3]);
        assert_eq!(data.max_rank(), 3);

        let mut column = Vec::new();
        data.feature_column(1, &mut column);
        assert_eq!(column, vec![2.0, 5.0]);
    }

    #[test]
    fn whitespace_columns() {
        let config = Config::new();
        let data = Data::from_csv(&config, "1.0  2.0   2\n  4 5 1\n").unwrap();

        assert_eq!(data.nfeatures(), 2);
        assert_eq!(data.nexamples(), 2);
        assert_eq!(data.example(0), &[1.0, 2.0]);
        assert_eq!(data.example(1), &[4.0, 5.0]);
        assert_eq!(data.feat_name(0), "");
        assert_eq!(data.ranks(), &[2, 1]);
    }

    #[test]
    fn invalid_records() {
        let mut config = Config::new();
        assert!(Data::from_csv(&config, "1.0 2.0 0\n").is_err());    // rank 0
        assert!(Data::from_csv(&config, "1.0 2.0 1.5\n").is_err());  // fractional rank
        assert!(Data::from_csv(&config, "1.0 2.0 1\n3.0 1\n").is_err()); // ragged
        assert!(Data::from_csv(&config, "1.0 x 1\n").is_err());
        assert!(Data::from_csv(&config, "").is_err());
        assert!(Data::from_csv(&config, "1.0 2.0 1e300\n").is_err());
        assert!(Data::from_csv(&config, "1.0 2.0 inf\n").is_err());
        assert!(Data::from_csv(&config, "1.0 2.0 65537\n").is_err());
        assert_eq!(Data::from_csv(&config, "1.0 2.0 65536\n").unwrap().max_rank(), MAX_RANK);

        config.n_rank = 2;
        assert!(Data::from_csv(&config, "1.0 2.0 3\n").is_err());
    }
}

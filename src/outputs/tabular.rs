//! CSV encoding.
//!
//! Output starts with a UTF-8 byte order mark so spreadsheet applications
//! detect the encoding, followed by a header row of [`COLUMNS`].

use super::COLUMNS;
use crate::models::Record;

const BOM: &str = "\u{feff}";

pub fn to_csv_bytes(records: &[Record]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BOM.as_bytes().to_vec());

    writer.write_record(COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_only_for_empty_input() {
        let bytes = to_csv_bytes(&[]).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "\u{feff}title,organization,location,url,postedAt\n"
        );
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        let record = Record {
            title: "Engineer, Backend".into(),
            organization: "N/A".into(),
            location: "Austin, TX".into(),
            url: "https://www.linkedin.com/jobs/view/3".into(),
            posted_at: "N/A".into(),
        };
        let text = String::from_utf8(to_csv_bytes(&[record]).unwrap()).unwrap();
        assert!(text.ends_with(
            "\"Engineer, Backend\",N/A,\"Austin, TX\",https://www.linkedin.com/jobs/view/3,N/A\n"
        ));
    }
}

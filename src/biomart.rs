//! Client for the Ensembl BioMart query service (`martservice`).
//!
//! Opening a [`MartDataset`] performs the two discovery requests: the mart
//! registry (XML) and the dataset listing of the chosen mart (TSV). Queries
//! are sent as an XML document in the `query` parameter and answered with a
//! TSV table that ends in a `[success]` completion stamp.
//!
//! Results come back sorted ascending by the first requested attribute, which
//! the resolver relies on when pairing versioned IDs.

use std::fmt::Write as _;

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use quick_xml::{
    Reader,
    escape::escape,
    events::{BytesStart, Event},
};

pub const DEFAULT_HOST: &str = "http://www.ensembl.org";
pub const SERVICE_PATH: &str = "/biomart/martservice";
pub const MART_NAME: &str = "ENSEMBL_MART_ENSEMBL";
pub const DATASET_NAME: &str = "hsapiens_gene_ensembl";
pub const DEFAULT_VIRTUAL_SCHEMA: &str = "default";

pub const GENE_ID_ATTRIBUTE: &str = "ensembl_gene_id";
pub const GENE_NAME_ATTRIBUTE: &str = "external_gene_name";
pub const GENE_ID_FILTER: &str = "link_ensembl_gene_id";

const COMPLETION_STAMP: &str = "[success]";
const QUERY_ERROR_MARKER: &str = "Query ERROR";

/// One row of a gene name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneRecord {
    pub id: String,
    pub name: String,
}

impl GeneRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Anything that can answer a batch of gene name lookups.
pub trait GeneNameSource {
    /// Returns one record per matched ID, sorted ascending by ID.
    fn lookup(&self, ids: &[String]) -> Result<Vec<GeneRecord>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MartLocation {
    pub name: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    pub name: String,
    pub display_name: String,
    pub virtual_schema: String,
}

pub struct MartDataset {
    agent: ureq::Agent,
    service_url: String,
    dataset: DatasetEntry,
}

impl MartDataset {
    /// Opens the human gene dataset of the Ensembl mart on `host`.
    pub fn connect(host: &str) -> Result<Self> {
        let service_url = format!("{}{}", host.trim_end_matches('/'), SERVICE_PATH);
        let agent = ureq::AgentBuilder::new().build();

        let registry = fetch(&agent, &service_url, &[("type", "registry")])
            .context("Fetching mart registry")?;
        let marts = parse_registry(&registry)?;
        let mart = marts
            .iter()
            .find(|mart| mart.name == MART_NAME)
            .ok_or_else(|| anyhow!("Mart {MART_NAME} is not listed by {service_url}"))?;
        debug!(
            "Found mart {} ({})",
            mart.name,
            mart.display_name.as_deref().unwrap_or("no display name")
        );

        let listing = fetch(
            &agent,
            &service_url,
            &[("type", "datasets"), ("mart", MART_NAME)],
        )
        .with_context(|| format!("Fetching datasets of {MART_NAME}"))?;
        let dataset = parse_datasets(&listing)?
            .into_iter()
            .find(|entry| entry.name == DATASET_NAME)
            .ok_or_else(|| anyhow!("Dataset {DATASET_NAME} is not available in {MART_NAME}"))?;
        debug!(
            "Connected to {} dataset {} ({})",
            service_url, dataset.name, dataset.display_name
        );

        Ok(Self {
            agent,
            service_url,
            dataset,
        })
    }

    pub fn query(&self, attributes: &[&str], filter: (&str, &[String])) -> Result<Vec<Vec<String>>> {
        let xml = build_query_xml(
            &self.dataset.virtual_schema,
            &self.dataset.name,
            attributes,
            filter,
        );
        let body = fetch(&self.agent, &self.service_url, &[("query", xml.as_str())])?;
        parse_query_response(&body, attributes.len())
    }
}

impl GeneNameSource for MartDataset {
    fn lookup(&self, ids: &[String]) -> Result<Vec<GeneRecord>> {
        let rows = self.query(
            &[GENE_ID_ATTRIBUTE, GENE_NAME_ATTRIBUTE],
            (GENE_ID_FILTER, ids),
        )?;
        Ok(rows
            .into_iter()
            .map(|mut row| {
                let name = row.pop().unwrap_or_default();
                let id = row.pop().unwrap_or_default();
                GeneRecord { id, name }
            })
            .collect())
    }
}

fn fetch(agent: &ureq::Agent, url: &str, params: &[(&str, &str)]) -> Result<String> {
    let mut request = agent.get(url);
    for (key, value) in params {
        request = request.query(key, value);
    }
    debug!(
        "GET {url} ({})",
        params.iter().map(|(key, _)| *key).collect::<Vec<_>>().join(", ")
    );
    let response = request
        .call()
        .map_err(|err| anyhow!("Request to {url} failed: {err}"))?;
    response
        .into_string()
        .with_context(|| format!("Reading response from {url}"))
}

pub fn parse_registry(xml: &str) -> Result<Vec<MartLocation>> {
    let mut reader = Reader::from_str(xml);
    let mut marts = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"MartURLLocation" =>
            {
                let Some(name) = attribute_value(e, "name")? else {
                    continue;
                };
                marts.push(MartLocation {
                    name,
                    display_name: attribute_value(e, "displayName")?,
                });
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => bail!(
                "Malformed mart registry at position {}: {err}",
                reader.buffer_position()
            ),
        }
    }
    if marts.is_empty() {
        bail!("Mart registry does not list any marts");
    }
    Ok(marts)
}

fn attribute_value(event: &BytesStart, key: &str) -> Result<Option<String>> {
    for attr in event.attributes().with_checks(false) {
        let attr = attr?;
        if attr.key.local_name().as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Parses the tab-separated dataset listing of a mart. Rows carry the entry
/// type, name, display name, visibility and assembly, two unused fields, the
/// virtual schema and a date.
pub fn parse_datasets(listing: &str) -> Result<Vec<DatasetEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .flexible(true)
        .quoting(false)
        .from_reader(listing.as_bytes());
    let mut entries = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading dataset listing line {}", idx + 1))?;
        let Some(name) = record.get(1).map(str::trim).filter(|name| !name.is_empty()) else {
            continue;
        };
        entries.push(DatasetEntry {
            name: name.to_string(),
            display_name: record.get(2).unwrap_or_default().trim().to_string(),
            virtual_schema: record
                .get(7)
                .map(str::trim)
                .filter(|schema| !schema.is_empty())
                .unwrap_or(DEFAULT_VIRTUAL_SCHEMA)
                .to_string(),
        });
    }
    Ok(entries)
}

pub fn build_query_xml(
    virtual_schema: &str,
    dataset: &str,
    attributes: &[&str],
    (filter_name, filter_values): (&str, &[String]),
) -> String {
    let mut xml = String::new();
    let _ = write!(
        xml,
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><!DOCTYPE Query>\
         <Query virtualSchemaName=\"{}\" formatter=\"TSV\" header=\"1\" uniqueRows=\"1\" \
         datasetConfigVersion=\"0.6\" completionStamp=\"1\">\
         <Dataset name=\"{}\" interface=\"default\">",
        escape(virtual_schema),
        escape(dataset)
    );
    let _ = write!(
        xml,
        "<Filter name=\"{}\" value=\"{}\"/>",
        escape(filter_name),
        escape(filter_values.join(",").as_str())
    );
    for attribute in attributes {
        let _ = write!(xml, "<Attribute name=\"{}\"/>", escape(*attribute));
    }
    xml.push_str("</Dataset></Query>");
    xml
}

/// Splits a TSV query response into rows of `width` cells, dropping the
/// header line and the completion stamp.
pub fn parse_query_response(body: &str, width: usize) -> Result<Vec<Vec<String>>> {
    if body.contains(QUERY_ERROR_MARKER) {
        bail!("Mart rejected the query: {}", body.trim());
    }
    let trimmed = body.trim_end_matches(['\r', '\n']);
    let Some(table) = trimmed.strip_suffix(COMPLETION_STAMP) else {
        bail!("Mart response is incomplete (no completion stamp)");
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b'\t')
        .flexible(true)
        .quoting(false)
        .from_reader(table.as_bytes());
    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading result line {}", idx + 2))?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        if record.len() > width {
            bail!(
                "Result line {} has {} field(s), expected {width}",
                idx + 2,
                record.len()
            );
        }
        let mut row = record.iter().map(str::to_string).collect::<Vec<_>>();
        row.resize(width, String::new());
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MartRegistry>
  <MartURLLocation database="ensembl_mart_110" default="1" displayName="Ensembl Genes 110" host="www.ensembl.org" includeDatasets="" martUser="" name="ENSEMBL_MART_ENSEMBL" path="/biomart/martservice" port="80" serverVirtualSchema="default" visible="1" />
  <MartURLLocation database="mouse_mart_110" default="0" displayName="Mouse strains 110" host="www.ensembl.org" name="ENSEMBL_MART_MOUSE" path="/biomart/martservice" port="80" serverVirtualSchema="default" visible="1" />
</MartRegistry>"#;

    #[test]
    fn registry_lists_marts() {
        let marts = parse_registry(REGISTRY).expect("registry");
        assert_eq!(marts.len(), 2);
        assert_eq!(marts[0].name, MART_NAME);
        assert_eq!(marts[0].display_name.as_deref(), Some("Ensembl Genes 110"));
    }

    #[test]
    fn empty_registry_is_an_error() {
        assert!(parse_registry("<html><body>Service unavailable</body></html>").is_err());
    }

    #[test]
    fn dataset_listing_skips_blank_lines() {
        let listing = "\n\
TableSet\thsapiens_gene_ensembl\tHuman genes (GRCh38.p14)\t1\tGRCh38.p14\t200\t50000\tdefault\t2023-05-24 15:33:02\n\
\n\
TableSet\tmmusculus_gene_ensembl\tMouse genes (GRCm39)\t1\tGRCm39\t200\t50000\tdefault\t2023-05-24 15:33:02\n";
        let datasets = parse_datasets(listing).expect("datasets");
        assert_eq!(datasets.len(), 2);
        assert_eq!(datasets[0].name, DATASET_NAME);
        assert_eq!(datasets[0].display_name, "Human genes (GRCh38.p14)");
        assert_eq!(datasets[1].virtual_schema, "default");
    }

    #[test]
    fn query_xml_lists_filter_values_and_attributes() {
        let ids = vec!["ENSG00000139618".to_string(), "ENSG00000141510".to_string()];
        let xml = build_query_xml(
            "default",
            DATASET_NAME,
            &[GENE_ID_ATTRIBUTE, GENE_NAME_ATTRIBUTE],
            (GENE_ID_FILTER, &ids),
        );
        assert!(xml.contains(
            "<Filter name=\"link_ensembl_gene_id\" value=\"ENSG00000139618,ENSG00000141510\"/>"
        ));
        assert!(xml.contains("<Attribute name=\"ensembl_gene_id\"/><Attribute name=\"external_gene_name\"/>"));
        assert!(xml.contains("completionStamp=\"1\""));
        assert!(xml.ends_with("</Dataset></Query>"));
    }

    #[test]
    fn query_xml_escapes_values() {
        let ids = vec!["a\"b<c".to_string()];
        let xml = build_query_xml("default", DATASET_NAME, &[GENE_ID_ATTRIBUTE], (GENE_ID_FILTER, &ids));
        assert!(xml.contains("value=\"a&quot;b&lt;c\""));
    }

    #[test]
    fn query_response_rows_keep_empty_names() {
        let body = "Gene stable ID\tGene name\nENSG00000139618\tBRCA2\nENSG00000284332\t\n[success]\n";
        let rows = parse_query_response(body, 2).expect("rows");
        assert_eq!(
            rows,
            vec![
                vec!["ENSG00000139618".to_string(), "BRCA2".to_string()],
                vec!["ENSG00000284332".to_string(), String::new()],
            ]
        );
    }

    #[test]
    fn query_errors_and_truncation_are_rejected() {
        assert!(parse_query_response("Query ERROR: caught BioMart::Exception", 2).is_err());
        assert!(parse_query_response("Gene stable ID\tGene name\nENSG00000139618\tBRCA2\n", 2).is_err());
        assert!(parse_query_response("Gene stable ID\tGene name\n[success]\n", 2)
            .expect("empty")
            .is_empty());
    }
}

// tests/fetch_workflow_test.rs

use std::io::{Cursor, Write};
use std::time::Duration;

use gdal::vector::LayerAccess;
use geoserver_dl::{ClientConfig, DecodedResult, Error, QueryParams, VectorWriter, WfsClient};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const COUNTIES_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xsd:schema xmlns:gml="http://www.opengis.net/gml" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <xsd:complexType name="countiesType">
    <xsd:complexContent>
      <xsd:extension base="gml:AbstractFeatureType">
        <xsd:sequence>
          <xsd:element name="nuts3name" nillable="true" type="xsd:string"/>
          <xsd:element name="countyname" nillable="true" type="xsd:string"/>
          <xsd:element name="total2011" nillable="true" type="xsd:decimal"/>
          <xsd:element name="gid" nillable="true" type="xsd:int"/>
          <xsd:element name="geom" nillable="true" type="gml:MultiSurfacePropertyType"/>
        </xsd:sequence>
      </xsd:extension>
    </xsd:complexContent>
  </xsd:complexType>
  <xsd:element name="counties" substitutionGroup="gml:_Feature" type="census2011:countiesType"/>
</xsd:schema>"#;

// The blocking client must not be created or dropped on an async worker
// thread, so every call runs inside spawn_blocking.
async fn blocking<T, F>(f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.unwrap()
}

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::default()
        .with_host(server.uri())
        .with_timeout(Duration::from_secs(5))
}

async fn mount_schema(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/wfs"))
        .and(query_param("request", "DescribeFeatureType"))
        .and(query_param("typeName", "census2011:counties"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(COUNTIES_XSD, "text/xml"))
        .mount(server)
        .await;
}

fn get_feature() -> wiremock::MockBuilder {
    Mock::given(method("GET"))
        .and(path("/census2011/ows"))
        .and(query_param("request", "GetFeature"))
        .and(query_param("typeName", "census2011:counties"))
}

fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn test_fetch_json_with_property_subset() {
    let server = MockServer::start().await;
    mount_schema(&server).await;

    let geojson = json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"nuts3name": "Dublin", "countyname": "Fingal"},
            "geometry": {"type": "MultiPolygon", "coordinates": []}
        }]
    });
    get_feature()
        .and(query_param("cql_filter", "nuts3name = 'Dublin'"))
        .and(query_param("propertyName", "nuts3name,countyname,geom"))
        .and(query_param("srsName", "EPSG:29903"))
        .and(query_param("outputFormat", "application/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(geojson.to_string(), "application/json;charset=UTF-8"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let result = blocking(move || {
        let client = WfsClient::new(config).unwrap();
        let dataset = client.dataset("census2011", "counties");
        let query = QueryParams::new()
            .filter("nuts3name = 'Dublin'")
            .properties(["countyname", "nuts3name"])
            .srs(29903)
            .output_format("application/json");
        client.fetch(&dataset, &query, None)
    })
    .await
    .unwrap();

    let DecodedResult::Json { schema, geojson: body } = result else {
        panic!("expected a JSON result");
    };
    assert_eq!(body, geojson);

    let names: Vec<&str> = schema.property_names().collect();
    assert_eq!(names, vec!["nuts3name", "countyname"]);
    assert_eq!(schema.property("nuts3name").unwrap().type_tag, "str");
    assert_eq!(schema.geometry_column.as_deref(), Some("geom"));
}

#[tokio::test]
async fn test_fetch_json_normalizes_full_schema() {
    let server = MockServer::start().await;
    mount_schema(&server).await;
    get_feature()
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"type":"FeatureCollection","features":[]}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let result = blocking(move || {
        let client = WfsClient::new(config).unwrap();
        let dataset = client.dataset("census2011", "counties");
        client.fetch(&dataset, &QueryParams::default(), None)
    })
    .await
    .unwrap();

    let DecodedResult::Json { schema, .. } = result else {
        panic!("expected a JSON result");
    };
    let tags: Vec<(&str, &str)> = schema
        .properties
        .iter()
        .map(|p| (p.name.as_str(), p.type_tag.as_str()))
        .collect();
    assert_eq!(
        tags,
        vec![
            ("nuts3name", "str"),
            ("countyname", "str"),
            ("total2011", "float"),
            ("gid", "int"),
        ]
    );

    // nothing optional was requested, so nothing optional was sent
    let requests = server.received_requests().await.unwrap();
    let get_feature = requests
        .iter()
        .find(|r| r.url.path() == "/census2011/ows")
        .unwrap();
    let query = get_feature.url.query().unwrap();
    for key in ["cql_filter", "propertyName", "srsName", "outputFormat"] {
        assert!(!query.contains(key), "{} sent in {}", key, query);
    }
}

#[tokio::test]
async fn test_fetch_csv_returns_text() {
    let server = MockServer::start().await;
    mount_schema(&server).await;
    let csv = "FID,nuts3name,countyname\ncounties.1,Dublin,Fingal\n";
    get_feature()
        .and(query_param("outputFormat", "csv"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(csv, "text/csv;charset=UTF-8"))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let result = blocking(move || {
        let client = WfsClient::new(config).unwrap();
        let dataset = client.dataset("census2011", "counties");
        client.fetch(&dataset, &QueryParams::new().output_format("csv"), None)
    })
    .await
    .unwrap();

    assert_eq!(
        result,
        DecodedResult::Csv {
            text: csv.to_string()
        }
    );
}

#[tokio::test]
async fn test_fetch_zip_extracts_members() {
    let server = MockServer::start().await;
    mount_schema(&server).await;
    let archive = build_zip(&[
        ("counties.shp", "shp"),
        ("counties.dbf", "dbf"),
        ("counties.prj", "PROJCS[]"),
    ]);
    get_feature()
        .and(query_param("outputFormat", "SHAPE-ZIP"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(archive, "application/zip"))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let out_dir = temp_dir.path().join("counties");
    let config = config_for(&server);
    let target = out_dir.clone();
    let result = blocking(move || {
        let client = WfsClient::new(config).unwrap();
        let dataset = client.dataset("census2011", "counties");
        let query = QueryParams::new().output_format("SHAPE-ZIP");
        client.fetch(&dataset, &query, Some(target.as_path()))
    })
    .await
    .unwrap();

    let DecodedResult::Zip { directory, files } = result else {
        panic!("expected a zip result");
    };
    assert_eq!(directory, out_dir);
    assert_eq!(files, vec!["counties.shp", "counties.dbf", "counties.prj"]);
    for file in &files {
        assert!(out_dir.join(file).exists(), "{} was not extracted", file);
    }
}

#[tokio::test]
async fn test_fetch_zip_without_directory_is_configuration_error() {
    let server = MockServer::start().await;
    mount_schema(&server).await;
    get_feature()
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"not even a zip".to_vec(), "application/zip"),
        )
        .mount(&server)
        .await;

    let config = config_for(&server);
    let err = blocking(move || {
        let client = WfsClient::new(config).unwrap();
        let dataset = client.dataset("census2011", "counties");
        client.fetch(&dataset, &QueryParams::new().output_format("SHAPE-ZIP"), None)
    })
    .await
    .unwrap_err();

    // the bogus body would be a decode error had it been read
    assert!(matches!(err, Error::Configuration(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_fetch_error_status_is_transport_error() {
    for status in [404, 500] {
        let server = MockServer::start().await;
        mount_schema(&server).await;
        get_feature()
            .respond_with(
                ResponseTemplate::new(status).set_body_raw("{not json", "application/json"),
            )
            .mount(&server)
            .await;

        let config = config_for(&server);
        let err = blocking(move || {
            let client = WfsClient::new(config).unwrap();
            let dataset = client.dataset("census2011", "counties");
            client.fetch(&dataset, &QueryParams::default(), None)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Transport { .. }), "{}: got {:?}", status, err);
    }
}

#[tokio::test]
async fn test_schema_lookup_failure_is_transport_error() {
    let server = MockServer::start().await;
    // nothing mounted: every request is a 404

    let config = config_for(&server);
    let err = blocking(move || {
        let client = WfsClient::new(config).unwrap();
        let dataset = client.dataset("census2011", "counties");
        client.fetch(&dataset, &QueryParams::default(), None)
    })
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Transport { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error() {
    let config = ClientConfig::default()
        .with_host("http://127.0.0.1:9")
        .with_timeout(Duration::from_secs(2));
    let err = blocking(move || {
        let client = WfsClient::new(config).unwrap();
        let dataset = client.dataset("census2011", "counties");
        client.fetch(&dataset, &QueryParams::default(), None)
    })
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Transport { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_unsupported_content_type_is_format_error() {
    let server = MockServer::start().await;
    mount_schema(&server).await;
    get_feature()
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<wfs:FeatureCollection/>",
            "text/xml; subtype=gml/2.1.2",
        ))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let err = blocking(move || {
        let client = WfsClient::new(config).unwrap();
        let dataset = client.dataset("census2011", "counties");
        client.fetch(&dataset, &QueryParams::default(), None)
    })
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Format(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_missing_content_type_is_format_error() {
    let server = MockServer::start().await;
    mount_schema(&server).await;
    get_feature()
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let err = blocking(move || {
        let client = WfsClient::new(config).unwrap();
        let dataset = client.dataset("census2011", "counties");
        client.fetch(&dataset, &QueryParams::default(), None)
    })
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Format(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_malformed_json_is_decode_error() {
    let server = MockServer::start().await;
    mount_schema(&server).await;
    get_feature()
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("{\"type\": \"FeatureCol", "application/json"),
        )
        .mount(&server)
        .await;

    let config = config_for(&server);
    let err = blocking(move || {
        let client = WfsClient::new(config).unwrap();
        let dataset = client.dataset("census2011", "counties");
        client.fetch(&dataset, &QueryParams::default(), None)
    })
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Decode { format: "json", .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_unknown_properties_are_configuration_error() {
    let server = MockServer::start().await;
    mount_schema(&server).await;
    get_feature()
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .expect(0)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let err = blocking(move || {
        let client = WfsClient::new(config).unwrap();
        let dataset = client.dataset("census2011", "counties");
        let query = QueryParams::new().properties(["population"]);
        client.fetch(&dataset, &query, None)
    })
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Configuration(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_fetch_geometry_only() {
    let server = MockServer::start().await;
    mount_schema(&server).await;
    get_feature()
        .and(query_param("propertyName", "geom"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"type":"FeatureCollection","features":[]}"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let result = blocking(move || {
        let client = WfsClient::new(config).unwrap();
        let dataset = client.dataset("census2011", "counties");
        client.fetch(&dataset, &QueryParams::new().properties(["geom"]), None)
    })
    .await
    .unwrap();

    let DecodedResult::Json { schema, .. } = result else {
        panic!("expected a JSON result");
    };
    assert!(schema.properties.is_empty());
    assert_eq!(schema.geometry_column.as_deref(), Some("geom"));
}

#[tokio::test]
async fn test_fetch_and_write_geojson() {
    if gdal::DriverManager::get_driver_by_name("GeoJSON").is_err()
        || gdal::spatial_ref::SpatialRef::from_epsg(2157).is_err()
    {
        eprintln!("Skipping test: GeoJSON driver or EPSG data not available in GDAL");
        return;
    }

    let server = MockServer::start().await;
    mount_schema(&server).await;
    let geojson = json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"nuts3name": "Dublin", "total2011": "1273069", "gid": 7},
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [[[[715000.0, 735000.0], [720000.0, 735000.0],
                                  [720000.0, 740000.0], [715000.0, 735000.0]]]]
            }
        }]
    });
    get_feature()
        .and(query_param("srsName", "EPSG:2157"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            geojson.to_string(),
            "application/json;charset=UTF-8",
        ))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let directory = temp_dir.path().to_path_buf();
    let config = config_for(&server);
    let path = blocking(move || {
        let client = WfsClient::new(config).unwrap();
        let dataset = client.dataset("census2011", "counties");
        let query = QueryParams::new()
            .properties(["nuts3name", "total2011", "gid"])
            .srs(2157);
        let DecodedResult::Json { schema, geojson } = client.fetch(&dataset, &query, None)? else {
            panic!("expected a JSON result");
        };
        VectorWriter::new("GeoJSON", 2157)?.write(&geojson, &schema, &directory, "dublin")
    })
    .await
    .unwrap();

    assert_eq!(path, temp_dir.path().join("dublin.geojson"));
    let dataset = gdal::Dataset::open(&path).unwrap();
    let layer = dataset.layer(0).unwrap();
    assert_eq!(layer.feature_count(), 1);
    let names: Vec<String> = layer.defn().fields().map(|f| f.name()).collect();
    assert_eq!(names, vec!["nuts3name", "total2011", "gid"]);
}

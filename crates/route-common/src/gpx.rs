//! GPX export for tracks.

use std::io::Cursor;

use chrono::SecondsFormat;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{RouteError, RouteResult};
use crate::track::Track;

const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";

fn xml_err(e: quick_xml::Error) -> RouteError {
    RouteError::Internal(format!("GPX write failed: {}", e))
}

impl Track {
    /// Render the track as a GPX 1.1 document with a single segment.
    pub fn to_gpx(&self, name: &str) -> RouteResult<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;

        let gpx = BytesStart::new("gpx").with_attributes([
            ("version", "1.1"),
            ("creator", "route-maps"),
            ("xmlns", GPX_NAMESPACE),
        ]);
        writer.write_event(Event::Start(gpx)).map_err(xml_err)?;
        writer
            .write_event(Event::Start(BytesStart::new("trk")))
            .map_err(xml_err)?;

        if !name.is_empty() {
            writer
                .write_event(Event::Start(BytesStart::new("name")))
                .map_err(xml_err)?;
            writer
                .write_event(Event::Text(BytesText::new(name)))
                .map_err(xml_err)?;
            writer
                .write_event(Event::End(BytesEnd::new("name")))
                .map_err(xml_err)?;
        }

        writer
            .write_event(Event::Start(BytesStart::new("trkseg")))
            .map_err(xml_err)?;

        for point in self.points() {
            let lat = point.latitude.to_string();
            let lon = point.longitude.to_string();
            let trkpt = BytesStart::new("trkpt")
                .with_attributes([("lat", lat.as_str()), ("lon", lon.as_str())]);

            match point.datetime() {
                Some(time) => {
                    writer.write_event(Event::Start(trkpt)).map_err(xml_err)?;
                    let stamp = time.to_rfc3339_opts(SecondsFormat::AutoSi, true);
                    writer
                        .write_event(Event::Start(BytesStart::new("time")))
                        .map_err(xml_err)?;
                    writer
                        .write_event(Event::Text(BytesText::new(&stamp)))
                        .map_err(xml_err)?;
                    writer
                        .write_event(Event::End(BytesEnd::new("time")))
                        .map_err(xml_err)?;
                    writer
                        .write_event(Event::End(BytesEnd::new("trkpt")))
                        .map_err(xml_err)?;
                }
                None => {
                    writer.write_event(Event::Empty(trkpt)).map_err(xml_err)?;
                }
            }
        }

        writer
            .write_event(Event::End(BytesEnd::new("trkseg")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("trk")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("gpx")))
            .map_err(xml_err)?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| RouteError::Internal(format!("GPX is not UTF-8: {}", e)))
    }
}

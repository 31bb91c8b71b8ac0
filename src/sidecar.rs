use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::metadata::FileInfo;

pub fn sidecar_path(image: &Path) -> PathBuf {
    image.with_extension("xmp")
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn alt_lang(tag: &str, value: &str) -> String {
    format!(
        "   <{tag}>\n    <rdf:Alt>\n     <rdf:li xml:lang=\"x-default\">{}</rdf:li>\n    </rdf:Alt>\n   </{tag}>\n",
        escape(value)
    )
}

/// A minimal XMP packet carrying the edits the data model keeps for a file.
pub fn xmp_packet(info: &FileInfo) -> String {
    let mut body = String::new();
    if let Some(title) = &info.title {
        body.push_str(&alt_lang("dc:title", title));
    }
    if let Some(creator) = &info.creator {
        body.push_str(&format!(
            "   <dc:creator>\n    <rdf:Seq>\n     <rdf:li>{}</rdf:li>\n    </rdf:Seq>\n   </dc:creator>\n",
            escape(creator)
        ));
    }
    if let Some(copyright) = &info.copyright {
        body.push_str(&alt_lang("dc:rights", copyright));
    }
    if let Some(rating) = info.rating {
        body.push_str(&format!("   <xmp:Rating>{}</xmp:Rating>\n", rating));
    }
    if let Some(label) = &info.label {
        body.push_str(&format!("   <xmp:Label>{}</xmp:Label>\n", escape(label)));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/" x:xmptk="Winnow">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
    xmlns:xmp="http://ns.adobe.com/xap/1.0/"
    xmlns:dc="http://purl.org/dc/elements/1.1/">
{body}  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>
"#
    )
}

/// Puts a sidecar next to `dest_image`: the source's own `.xmp` is copied
/// when it has one, otherwise a fresh packet is written from `info`.
pub fn export(source_image: &Path, info: &FileInfo, dest_image: &Path) -> io::Result<PathBuf> {
    let target = sidecar_path(dest_image);
    let existing = sidecar_path(source_image);
    if existing.is_file() {
        fs::copy(&existing, &target)?;
    } else {
        fs::write(&target, xmp_packet(info))?;
    }
    Ok(target)
}

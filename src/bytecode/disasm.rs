use std::collections::HashMap;
use std::fmt::Write;

use crate::bytecode::image::CodeImage;

/// Render a compiled image as text: pools, tables, then the code words with
/// line markers and identifier annotations.
pub fn disassemble(image: &CodeImage) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    write_image(&mut out, image)?;
    Ok(out)
}

fn write_image(out: &mut String, image: &CodeImage) -> std::fmt::Result {
    writeln!(out, "=== COMPILED IMAGE ({:?}) ===\n", image.mode)?;

    write_strings(out, "global strings", &image.global_strings)?;
    write_strings(out, "function strings", &image.function_strings)?;
    write_floats(out, "global floats", &image.global_floats)?;
    write_floats(out, "function floats", &image.function_floats)?;

    if !image.idents.is_empty() {
        header(out, "identifier references", image.idents.len())?;
        for entry in &image.idents {
            let name = image.global_string(entry.offset).unwrap_or("?");
            writeln!(out, "  @{:<6} {:<20} {:?}", entry.offset, name, entry.addresses)?;
        }
        writeln!(out)?;
    }

    if !image.locals.is_empty() {
        header(out, "local variables", image.locals.len())?;
        for f in image.locals.functions() {
            writeln!(out, "  {}", f.key)?;
            for (slot, var) in f.vars.iter().enumerate() {
                writeln!(out, "    r{:<4} {}", slot, var)?;
            }
        }
        writeln!(out)?;
    }

    write_code(out, image)
}

fn header(out: &mut String, title: &str, count: usize) -> std::fmt::Result {
    writeln!(out, "════════════════════════════════════════")?;
    writeln!(out, " {} ({})", title, count)?;
    writeln!(out, "════════════════════════════════════════")
}

fn write_strings(out: &mut String, title: &str, pool: &[u8]) -> std::fmt::Result {
    if pool.is_empty() {
        return Ok(());
    }
    header(out, title, pool.len())?;

    let mut offset = 0;
    while offset < pool.len() {
        let end = pool[offset..]
            .iter()
            .position(|&b| b == 0)
            .map_or(pool.len(), |n| offset + n);
        if end > offset {
            writeln!(out, "  @{:<6} {:?}", offset, String::from_utf8_lossy(&pool[offset..end]))?;
        }
        offset = end + 1;
    }
    writeln!(out)
}

fn write_floats(out: &mut String, title: &str, pool: &[f64]) -> std::fmt::Result {
    if pool.is_empty() {
        return Ok(());
    }
    header(out, title, pool.len())?;
    for (i, v) in pool.iter().enumerate() {
        writeln!(out, "  #{:<6} {}", i, v)?;
    }
    writeln!(out)
}

fn write_code(out: &mut String, image: &CodeImage) -> std::fmt::Result {
    let code = image.code.code();
    header(out, "code", code.len())?;

    let lines: HashMap<u32, u32> = image
        .code
        .line_break_pairs()
        .map(|(line, addr)| (addr, line))
        .collect();

    let mut ident_refs = HashMap::new();
    for entry in &image.idents {
        for addr in &entry.addresses {
            ident_refs.insert(*addr, entry.offset);
        }
    }

    for (ip, word) in code.iter().enumerate() {
        let ip = ip as u32;
        if let Some(line) = lines.get(&ip) {
            writeln!(out, "      ┌─── line {}", line)?;
        }

        let marker = if lines.contains_key(&ip) { "► " } else { "  " };
        write!(out, "{:04} {}{:08x}", ip, marker, word)?;

        if let Some(offset) = ident_refs.get(&ip) {
            let name = image.global_string(*offset).unwrap_or("?");
            write!(out, "    ; ident '{}'", name)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

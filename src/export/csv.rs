//! Raw measurement CSV export
//!
//! The CSV carries the unprocessed samples so external tooling can redo the
//! statistics. Comment lines starting with `#` label the row that follows.

use crate::domain::ExportError;
use crate::protocol::{MeasurementSeries, Measurements, ProfilingResult};
use std::io::Write;

pub fn write_csv<W: Write>(result: &ProfilingResult, out: &mut W) -> Result<(), ExportError> {
    writeln!(out, "# mode,signature,device,elapsedTime,commandHeader,inputSource,inputDivision")?;
    writeln!(
        out,
        "{},{},{},{},{},{},{}",
        result.mode,
        result.signature,
        result.device_id,
        result.elapsed,
        result.command_header,
        result.input_descriptor,
        result.input_division,
    )?;

    writeln!(out, "# input1,input2,...")?;
    writeln!(out, "{}", result.inputs.join(","))?;

    match &result.measurements {
        Measurements::Time(series) => write_time_rows(result, series, out),
        Measurements::Memory(set) => {
            writeln!(out, "# trapName,freeTransientDeselect,freeTransientReset,freePersistent")?;
            for (trap, name) in &result.trap_names {
                writeln!(
                    out,
                    "{name},{},{},{}",
                    field(single(set.transient_deselect.get(*trap))),
                    field(single(set.transient_reset.get(*trap))),
                    field(single(set.persistent.get(*trap))),
                )?;
            }
            Ok(())
        }
    }
}

fn write_time_rows<W: Write>(
    result: &ProfilingResult,
    series: &MeasurementSeries,
    out: &mut W,
) -> Result<(), ExportError> {
    writeln!(out, "# trapName,measurement1,measurement2,...")?;
    for (trap, name) in &result.trap_names {
        write!(out, "{name}")?;
        for sample in series.get(*trap).unwrap_or(&[]) {
            write!(out, ",{}", field(*sample))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

// unreached rounds export as empty fields
fn field(sample: Option<i64>) -> String {
    sample.map_or_else(String::new, |v| v.to_string())
}

fn single(samples: Option<&[Option<i64>]>) -> Option<i64> {
    samples.and_then(|s| s.first().copied().flatten())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InputDivision, Mode, TimeUnit, TrapId};
    use crate::protocol::MemorySeriesSet;

    fn base_result(measurements: Measurements, mode: Mode) -> ProfilingResult {
        ProfilingResult {
            mode,
            signature: "Example.process(APDU)".to_string(),
            device_id: "sim".to_string(),
            elapsed: "0d 00:00:00.123".to_string(),
            command_header: "00200000".to_string(),
            input_descriptor: "random:2".to_string(),
            input_division: InputDivision::None,
            time_unit: TimeUnit::Nano,
            inputs: vec!["00aa".to_string(), "00bb".to_string()],
            measurements,
            unreached: Vec::new(),
            trap_names: vec![
                (TrapId(2), "TRAP_Example_process_1".to_string()),
                (TrapId(3), "TRAP_Example_process_2".to_string()),
            ],
        }
    }

    #[test]
    fn time_csv_layout() {
        let mut series = MeasurementSeries::new();
        series.push(TrapId(2), Some(100));
        series.push(TrapId(2), Some(110));
        series.push(TrapId(3), Some(60));
        series.push(TrapId(3), None);

        let result = base_result(Measurements::Time(series), Mode::Time);
        let mut buf = Vec::new();
        write_csv(&result, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[1],
            "time,Example.process(APDU),sim,0d 00:00:00.123,00200000,random:2,none"
        );
        assert_eq!(lines[3], "00aa,00bb");
        assert_eq!(lines[5], "TRAP_Example_process_1,100,110");
        assert_eq!(lines[6], "TRAP_Example_process_2,60,");
    }

    #[test]
    fn memory_csv_layout() {
        let mut set = MemorySeriesSet::default();
        set.transient_deselect.push(TrapId(2), Some(900));
        set.transient_reset.push(TrapId(2), Some(800));
        set.persistent.push(TrapId(2), Some(5000));
        set.transient_deselect.push(TrapId(3), None);
        set.transient_reset.push(TrapId(3), None);
        set.persistent.push(TrapId(3), None);

        let result = base_result(Measurements::Memory(set), Mode::Memory);
        let mut buf = Vec::new();
        write_csv(&result, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[5], "TRAP_Example_process_1,900,800,5000");
        assert_eq!(lines[6], "TRAP_Example_process_2,,,");
    }
}

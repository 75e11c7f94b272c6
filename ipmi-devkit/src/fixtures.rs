/*!
Captured FreeIPMI output used across the test suites
*/

/// `ipmimonitoring` on a dual-socket board, header included
pub const IPMIMONITORING: &str = "\
ID  | Name             | Type              | State    | Reading    | Units | Event
1   | CPU1 Temp        | Temperature       | Nominal  | 42.00      | C     | 'OK'
2   | P1-DIMMA1 Temp   | Temperature       | Nominal  | 35.00      | C     | 'OK'
7   | Fan 1 Tach       | Fan               | Nominal  | 3200.00    | RPM   | 'OK'
8   | Fan 2 Tach       | Fan               | Critical | 0.00       | RPM   | 'At or Below (<=) Lower Critical Threshold'
12  | 12V              | Voltage           | Nominal  | 12.10      | V     | 'OK'
14  | PS1 Curr Out     | Current           | Nominal  | 8.40       | A     | 'OK'
15  | PS1 Input Power  | Power Supply      | Warning  | 410.00     | W     | 'OK'
20  | PS1 Status       | Power Supply      | Nominal  | N/A        | N/A   | 'Presence detected'
21  | Chassis Intru    | Physical Security | N/A      | N/A        | N/A   | 'General Chassis Intrusion'
";

/// Sensor rows in `IPMIMONITORING`
pub const IPMIMONITORING_ROWS: usize = 9;

/// Rows of `IPMIMONITORING` routed to the generic sensor families
pub const IPMIMONITORING_GENERIC_ROWS: usize = 2;

/// `ipmi-dcmi --get-system-power-statistics`
pub const IPMI_DCMI: &str = "\
Current Power                        : 145 Watts
Minimum Power over sampling duration : 98 watts
Maximum Power over sampling duration : 312 watts
Average Power over sampling duration : 151 watts
Time Stamp                           : 04/12/2024 - 09:14:55
Statistics reporting time period     : 1000 milliseconds
Power Measurement                    : Active
";

/// `ipmi-chassis --get-chassis-status`
pub const IPMI_CHASSIS: &str = "\
System Power                        : on
Power overload                      : false
Interlock                           : inactive
Power fault                         : false
Power control fault                 : false
Power restore policy                : Always off
Last Power Event                    : unknown
Chassis intrusion                   : inactive
Front panel lockout                 : inactive
Drive Fault                         : false
Cooling/fan fault                   : false
Chassis Identify state              : off
";

/// `ipmi-chassis` output cut short after the power line
pub const IPMI_CHASSIS_TRUNCATED: &str = "\
System Power                        : off
Power overload                      : false
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_count_matches_fixture() {
        let rows = IPMIMONITORING
            .lines()
            .filter(|l| {
                l.split('|')
                    .next()
                    .map(|id| id.trim().parse::<i64>().is_ok())
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(rows, IPMIMONITORING_ROWS);
    }
}

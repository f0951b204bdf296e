use anyhow::{anyhow, bail, Result};

/// Finds the first line carrying `prefix` and returns what follows it.
fn find_field_line<'a>(response: &'a str, prefix: &str, name: &str) -> Result<&'a str> {
    response
        .split(['\r', '\n'])
        .map(str::trim)
        .find(|line| line.starts_with(prefix))
        .ok_or(anyhow!("No {} response found in buffer", name))?
        .strip_prefix(prefix)
        .map(str::trim)
        .ok_or(anyhow!("Malformed {} response", name))
}

pub fn parse_cmgs_result(response: &str) -> Result<u8> {
    find_field_line(response, "+CMGS:", "CMGS")?
        .parse()
        .map_err(|_| anyhow!("Invalid CMGS message reference number"))
}

/// Returns `(mode, status)` from a `+CREG: <n>,<stat>` query response.
pub fn parse_creg_response(response: &str) -> Result<(u8, u8)> {
    let data = find_field_line(response, "+CREG:", "CREG")?;

    let mut parts = data.split(',');
    let mode: u8 = parts
        .next()
        .ok_or(anyhow!("Missing registration mode"))?
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid registration mode"))?;

    let status: u8 = parts
        .next()
        .ok_or(anyhow!("Missing registration status"))?
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid registration status"))?;

    Ok((mode, status))
}

pub fn parse_csq_response(response: &str) -> Result<(i32, i32)> {
    let data = find_field_line(response, "+CSQ:", "CSQ")?;

    let mut parts = data.split(',');
    let rssi: i32 = parts
        .next()
        .ok_or(anyhow!("Missing RSSI value"))?
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid RSSI value"))?;

    let ber: i32 = parts
        .next()
        .ok_or(anyhow!("Missing BER value"))?
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid BER value"))?;

    Ok((rssi, ber))
}

/// Returns `(mode, format, operator)` from a `+COPS: <mode>,<format>,"<oper>"` response.
pub fn parse_cops_response(response: &str) -> Result<(u8, u8, String)> {
    let data = find_field_line(response, "+COPS:", "COPS")?;

    let mut parts = data.splitn(3, ',');
    let mode: u8 = parts
        .next()
        .ok_or(anyhow!("Missing operator mode"))?
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid operator mode"))?;

    let format: u8 = parts
        .next()
        .ok_or(anyhow!("Missing operator format"))?
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid operator format"))?;

    let operator = parts
        .next()
        .ok_or(anyhow!("Missing operator name"))?
        .trim()
        .strip_prefix('"')
        .and_then(|s| s.split_once('"'))
        .map(|(name, _)| name.to_string())
        .ok_or(anyhow!("Operator name not properly quoted"))?;

    Ok((mode, format, operator))
}

/// Reads the single text line answered to an identification command such as
/// `AT+CGMI`, with or without a `+CGMI:` prefix.
pub fn parse_identity_response(response: &str, command: &str) -> Result<String> {
    let prefix = format!("{}:", command.trim_start_matches("AT"));
    let line = response
        .split(['\r', '\n'])
        .map(str::trim)
        .find(|line| !line.is_empty() && *line != "OK" && !line.starts_with("AT"))
        .ok_or(anyhow!("No {} response found in buffer", command))?;

    if line.contains("ERROR") {
        bail!("{} rejected: {}", command, line);
    }

    let value = line.strip_prefix(prefix.as_str()).map(str::trim).unwrap_or(line);
    let value = value.trim_matches('"');
    if value.is_empty() {
        bail!("Empty {} response", command);
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cmgs_result() {
        // Success cases
        let response = "AT+CMGS=10\r\n+CMGS: 123\r\nOK\r\n";
        assert_eq!(parse_cmgs_result(response).unwrap(), 123);

        let response = "AT+CMGS=10\r\n  +CMGS:   42  \r\nOK\r\n";
        assert_eq!(parse_cmgs_result(response).unwrap(), 42);

        let response = "\r+CMGS: 7\r\rOK\r";
        assert_eq!(parse_cmgs_result(response).unwrap(), 7);

        // Failure cases
        let response = "AT+CMGS=10\r\nOK\r\n";
        assert!(parse_cmgs_result(response).unwrap_err().to_string().contains("No CMGS response found"));

        let response = "+CMGS: abc\r\n";
        assert!(parse_cmgs_result(response).unwrap_err().to_string().contains("Invalid CMGS message reference number"));

        // References are a single octet.
        assert!(parse_cmgs_result("+CMGS: 300\r\n").is_err());
        assert!(parse_cmgs_result("").is_err());
    }

    #[test]
    fn test_parse_creg_response() {
        let response = "+CREG: 0,1\r\nOK\r\n";
        assert_eq!(parse_creg_response(response).unwrap(), (0, 1));

        let response = "  +CREG:  2 , 5  \r\nOK\r\n";
        assert_eq!(parse_creg_response(response).unwrap(), (2, 5));

        let response = "OK\r\n";
        assert!(parse_creg_response(response).unwrap_err().to_string().contains("No CREG response found"));

        let response = "+CREG: 1\r\n";
        assert!(parse_creg_response(response).unwrap_err().to_string().contains("Missing registration status"));

        let response = "+CREG: abc,1\r\n";
        assert!(parse_creg_response(response).unwrap_err().to_string().contains("Invalid registration mode"));
    }

    #[test]
    fn test_parse_csq_response() {
        let response = "+CSQ: 15,99\r\nOK\r\n";
        assert_eq!(parse_csq_response(response).unwrap(), (15, 99));

        let response = "ERROR\r\n";
        assert!(parse_csq_response(response).unwrap_err().to_string().contains("No CSQ response found"));

        let response = "+CSQ: 15\r\n";
        assert!(parse_csq_response(response).unwrap_err().to_string().contains("Missing BER value"));

        let response = "+CSQ: 15,xyz\r\n";
        assert!(parse_csq_response(response).unwrap_err().to_string().contains("Invalid BER value"));

        assert!(parse_csq_response("\r\n\r\n\r\n").is_err());
    }

    #[test]
    fn test_parse_cops_response() {
        let response = "+COPS: 0,0,\"Vodafone UK\"\r\nOK\r\n";
        assert_eq!(parse_cops_response(response).unwrap(), (0, 0, "Vodafone UK".to_string()));

        // Access technology may follow the operator name.
        let response = "\r\n+COPS: 1, 2, \"23415\",7\r\n\r\nOK\r\n";
        assert_eq!(parse_cops_response(response).unwrap(), (1, 2, "23415".to_string()));

        let response = "ERROR\r\n";
        assert!(parse_cops_response(response).unwrap_err().to_string().contains("No COPS response found"));

        // Unregistered modems answer with the mode only.
        let response = "+COPS: 0\r\nOK\r\n";
        assert!(parse_cops_response(response).unwrap_err().to_string().contains("Missing operator format"));

        let response = "+COPS: 0,0,Vodafone\r\n";
        assert!(parse_cops_response(response).unwrap_err().to_string().contains("Operator name not properly quoted"));

        let response = "+COPS: x,0,\"EE\"\r\n";
        assert!(parse_cops_response(response).unwrap_err().to_string().contains("Invalid operator mode"));
    }

    #[test]
    fn test_parse_identity_response() {
        let response = "\r\nSIMCOM_Ltd\r\n\r\nOK\r\n";
        assert_eq!(parse_identity_response(response, "AT+CGMI").unwrap(), "SIMCOM_Ltd");

        let response = "AT+CGMM\r\r\nSIMCOM_SIM800L\r\nOK\r\n";
        assert_eq!(parse_identity_response(response, "AT+CGMM").unwrap(), "SIMCOM_SIM800L");

        let response = "\r\n+CGMR: \"21.00.403.01\"\r\n\r\nOK\r\n";
        assert_eq!(parse_identity_response(response, "AT+CGMR").unwrap(), "21.00.403.01");

        let response = "\r\nOK\r\n";
        assert!(parse_identity_response(response, "AT+CGMI").unwrap_err().to_string().contains("No AT+CGMI response found"));

        let response = "\r\n+CME ERROR: 10\r\n";
        assert!(parse_identity_response(response, "AT+CGMR").unwrap_err().to_string().contains("rejected"));
    }
}

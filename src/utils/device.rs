use woothee::parser::Parser;

use crate::models::scan::DeviceType;

/// Rough device class of whoever opened a tracked code.
pub fn detect_device(user_agent: Option<&str>) -> DeviceType {
    let Some(user_agent) = user_agent else {
        return DeviceType::Desktop;
    };
    let Some(result) = Parser::new().parse(user_agent) else {
        return DeviceType::Desktop;
    };

    if result.os == "iPad" || (result.os == "Android" && !user_agent.contains("Mobile")) {
        return DeviceType::Tablet;
    }
    match result.category {
        "smartphone" | "mobilephone" => DeviceType::Mobile,
        "crawler" => DeviceType::Bot,
        _ => DeviceType::Desktop,
    }
}

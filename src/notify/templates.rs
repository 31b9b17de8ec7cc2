/// Subject and body of an outgoing message.
pub struct Rendered {
    pub subject: &'static str,
    pub body: String,
}

pub fn welcome(name: &str) -> Rendered {
    Rendered {
        subject: "Welcome to Our Platform",
        body: format!(
            "Hello {name}, welcome to our platform! Your account was successfully created."
        ),
    }
}

pub fn verify_otp(email: &str, otp: &str, valid_minutes: i64) -> Rendered {
    Rendered {
        subject: "Account Verification OTP",
        body: format!(
            "Your OTP is {otp}. Use it to verify the account registered to {email}. \
             The code is valid for {}.",
            describe_minutes(valid_minutes)
        ),
    }
}

pub fn reset_otp(email: &str, otp: &str, valid_minutes: i64) -> Rendered {
    Rendered {
        subject: "Password Reset OTP",
        body: format!(
            "Your password reset OTP is {otp}. Use it to reset the password for {email}. \
             The code is valid for {}.",
            describe_minutes(valid_minutes)
        ),
    }
}

fn describe_minutes(minutes: i64) -> String {
    match minutes {
        m if m % 60 == 0 && m >= 60 => {
            let hours = m / 60;
            format!("{hours} hour{}", if hours == 1 { "" } else { "s" })
        }
        m => format!("{m} minute{}", if m == 1 { "" } else { "s" }),
    }
}

